use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tracing::info_span;

use crate::aggregator::TextAggregator;
use crate::db::{employee_repo, Database};
use crate::error::StorageError;
use crate::extraction::{extract_corpus, normalize_result, ExtractionClient, ExtractionError};
use crate::fingerprint::{self, FingerprintStore};
use crate::processor::ConverterRegistry;
use crate::reconciler::{Dispatcher, ImportOutcome, ImportSummary};
use crate::storage::{ensure_directory, QuarantineReport};
use crate::worker::job::EnrichmentRequest;
use crate::worker::pool::EnrichmentRunner;

use super::config::PipelineConfig;
use super::error::PipelineError;

/// What one enrichment run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Documents unchanged since the last successful run; nothing was done.
    Unchanged,
    Enriched {
        business_id: String,
        documents: usize,
        summary: ImportSummary,
        /// Set when the extraction result was replaced by an empty document.
        degraded: Option<String>,
        archived_to: Option<PathBuf>,
    },
    Quarantined {
        business_id: String,
        reason: String,
    },
}

impl fmt::Display for EnrichmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentOutcome::Unchanged => write!(f, "documents unchanged"),
            EnrichmentOutcome::Enriched {
                documents,
                summary,
                degraded,
                ..
            } => {
                write!(
                    f,
                    "{} document(s), {} skill(s) added, {} updated",
                    documents, summary.associations_added, summary.associations_updated
                )?;
                if let Some(reason) = degraded {
                    write!(f, " (extraction degraded: {})", reason)?;
                }
                Ok(())
            }
            EnrichmentOutcome::Quarantined { reason, .. } => write!(f, "quarantined: {}", reason),
        }
    }
}

/// Documents changed → rebuild corpus → extract → reconcile → finalize.
pub struct EnrichmentPipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    aggregator: TextAggregator,
    client: Arc<dyn ExtractionClient>,
    dispatcher: Dispatcher,
}

impl EnrichmentPipeline {
    pub fn new(config: Arc<PipelineConfig>, db: Database, client: Arc<dyn ExtractionClient>) -> Self {
        Self::with_registry(config, db, client, Arc::new(ConverterRegistry::new()))
    }

    pub fn with_registry(
        config: Arc<PipelineConfig>,
        db: Database,
        client: Arc<dyn ExtractionClient>,
        registry: Arc<ConverterRegistry>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            db.clone(),
            &config.processed_directory,
            config.association_mode,
        );
        Self {
            aggregator: TextAggregator::new(registry),
            config,
            db,
            client,
            dispatcher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs enrichment for one employee.
    ///
    /// Fingerprints are only committed once the result has been reconciled,
    /// so any failure before that point makes the next run retry the same
    /// change. A degraded extraction (service failure or unusable answer)
    /// also leaves them untouched.
    pub fn run(&self, request: &EnrichmentRequest) -> Result<EnrichmentOutcome, PipelineError> {
        let employee = self
            .db
            .with_conn(|conn| employee_repo::find_by_id(conn, request.employee_id))?
            .ok_or(PipelineError::EmployeeNotFound {
                id: request.employee_id,
            })?;

        if employee.business_id != request.business_id.trim() {
            warn!(
                "Request for employee {} carried business id {}, using {}",
                employee.id, request.business_id, employee.business_id
            );
        }
        let business_id = employee.business_id;

        let _pipeline_span = info_span!("pipeline",
            employee_id = employee.id,
            business_id = %business_id,
        )
        .entered();

        // Step 1: decide whether anything changed
        let (sources, current, mut store) = {
            let _step = info_span!("pipeline.fingerprint").entered();

            let sources = self
                .aggregator
                .discover(&self.config.documents_directory(&business_id))?;
            let current = fingerprint::snapshot(&sources)?;
            let store = FingerprintStore::load(self.config.fingerprint_path(&business_id))
                .map_err(PipelineError::Fingerprint)?;

            let diff = store.diff(&current);
            let aggregate_exists = self.config.aggregate_path(&business_id).is_file();
            if !diff.changed && store.is_persisted() && aggregate_exists {
                debug!("Documents of {} unchanged", business_id);
                return Ok(EnrichmentOutcome::Unchanged);
            }

            debug!(
                "Documents of {} changed: {} new or modified, {} removed",
                business_id,
                diff.to_add.len(),
                diff.to_remove.len()
            );
            (sources, current, store)
        };

        // Step 2: rebuild the corpus
        let aggregate = {
            let _step = info_span!("pipeline.convert", documents = sources.len()).entered();
            self.aggregator
                .rebuild(&sources, &self.config.aggregate_path(&business_id))?
        };

        // Step 3: extract
        let (normalized, retry_later) = {
            let _step = info_span!("pipeline.extract", chars = aggregate.content_chars).entered();

            let corpus =
                std::fs::read_to_string(&aggregate.output).map_err(|e| StorageError::ReadFile {
                    path: aggregate.output.clone(),
                    source: e,
                })?;
            let outcome = extract_corpus(
                self.client.as_ref(),
                &corpus,
                aggregate.content_chars,
                self.config.min_corpus_chars,
            );
            let insufficient = matches!(outcome, Err(ExtractionError::InsufficientText { .. }));
            let normalized = normalize_result(outcome, &business_id);
            let retry_later = normalized.degraded.is_some() && !insufficient;
            (normalized, retry_later)
        };

        // Step 4: reconcile through the staging file
        let outcome = {
            let _step = info_span!("pipeline.reconcile").entered();
            let staged = stage_document(
                &self.config.staging_path(&business_id),
                &normalized.document,
            )?;
            let report =
                QuarantineReport::new(self.config.quarantine_directory(), self.config.debug_copies);
            self.dispatcher.import_file(&staged, &report)
        };

        // Step 5: finalize
        let _step = info_span!("pipeline.finalize").entered();
        match outcome {
            ImportOutcome::Archived {
                summary,
                archived_to,
                ..
            } => {
                if retry_later {
                    warn!(
                        "Extraction for {} degraded; fingerprints kept so the next run retries",
                        business_id
                    );
                } else {
                    store.commit(current).map_err(PipelineError::Fingerprint)?;
                }

                info!(
                    "Enriched {}: {} skill(s) added, {} updated, {} unchanged",
                    business_id,
                    summary.associations_added,
                    summary.associations_updated,
                    summary.associations_unchanged
                );
                Ok(EnrichmentOutcome::Enriched {
                    business_id,
                    documents: aggregate.documents,
                    summary,
                    degraded: normalized.degraded,
                    archived_to,
                })
            }
            ImportOutcome::Quarantined { reason } => {
                warn!("Extraction result for {} quarantined: {}", business_id, reason);
                Ok(EnrichmentOutcome::Quarantined {
                    business_id,
                    reason,
                })
            }
        }
    }
}

impl EnrichmentRunner for EnrichmentPipeline {
    fn run(&self, request: &EnrichmentRequest) -> Result<EnrichmentOutcome, PipelineError> {
        EnrichmentPipeline::run(self, request)
    }
}

/// Writes `document` to `path` via a temporary sibling, so a concurrent
/// staging scan never sees a half-written file.
fn stage_document(path: &Path, document: &Value) -> Result<PathBuf, StorageError> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let json = serde_json::to_vec_pretty(document).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StorageError::WriteFile {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(path.to_path_buf())
}
