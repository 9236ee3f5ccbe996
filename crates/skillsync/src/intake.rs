//! The synchronous side of a document upload.
//!
//! Accepting a document stores the file in the employee's documents folder
//! and records it, in one transaction, then hands back the
//! [`EnrichmentRequest`] to submit. Enrichment itself never runs on the
//! caller's path, so an enrichment failure cannot lose an upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::DocumentFormat;
use crate::db::document_repo::{self, DocumentKind, EmployeeDocument, NewDocument};
use crate::db::{employee_repo, Database, DatabaseError};
use crate::error::StorageError;
use crate::pipeline::PipelineConfig;
use crate::storage::create_exclusive;
use crate::worker::{EnrichmentPool, EnrichmentRequest};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("No employee with id {id}")]
    EmployeeNotFound { id: i64 },

    #[error("Invalid document name: '{0}'")]
    InvalidFileName(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A stored upload and the enrichment it calls for.
#[derive(Debug, Clone)]
pub struct AcceptedDocument {
    pub document: EmployeeDocument,
    pub stored_at: PathBuf,
    pub request: EnrichmentRequest,
}

pub struct DocumentIntake {
    config: Arc<PipelineConfig>,
    db: Database,
}

impl DocumentIntake {
    pub fn new(config: Arc<PipelineConfig>, db: Database) -> Self {
        Self { config, db }
    }

    /// Stores `content` under the employee's documents folder and records it.
    ///
    /// Only the final component of `filename` is used. An existing file of
    /// the same name is kept and the new one gets a numeric suffix.
    pub fn accept(
        &self,
        employee_id: i64,
        filename: &str,
        content: &[u8],
        kind: DocumentKind,
    ) -> Result<AcceptedDocument, IntakeError> {
        let name = clean_file_name(filename)?;
        let supported = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
            .is_some();
        if !supported {
            return Err(IntakeError::UnsupportedFormat(name));
        }

        self.db.with_transaction(|tx| {
            let employee = employee_repo::find_by_id(tx, employee_id)?
                .ok_or(IntakeError::EmployeeNotFound { id: employee_id })?;

            let stored_at = create_exclusive(
                &self.config.documents_directory(&employee.business_id),
                &name,
                content,
            )?;

            let document = match document_repo::insert(
                tx,
                &NewDocument {
                    employee_id,
                    file_path: stored_at.display().to_string(),
                    kind,
                },
            ) {
                Ok(document) => document,
                Err(e) => {
                    if let Err(remove_err) = std::fs::remove_file(&stored_at) {
                        log::warn!(
                            "Could not remove {} after failed insert: {}",
                            stored_at.display(),
                            remove_err
                        );
                    }
                    return Err(e.into());
                }
            };

            log::info!(
                "Stored document {} for {}",
                stored_at.display(),
                employee.business_id
            );

            Ok(AcceptedDocument {
                document,
                stored_at,
                request: EnrichmentRequest::new(employee.id, employee.business_id),
            })
        })
    }

    /// Deletes an employee after dropping any enrichment still waiting for
    /// them. Returns false if there was no such employee.
    pub fn offboard(&self, employee_id: i64, pool: &EnrichmentPool) -> Result<bool, IntakeError> {
        if pool.cancel(employee_id) {
            log::info!("Cancelled pending enrichment for employee {}", employee_id);
        }
        Ok(self
            .db
            .with_conn(|conn| employee_repo::delete(conn, employee_id))?)
    }
}

fn clean_file_name(filename: &str) -> Result<String, IntakeError> {
    Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.starts_with('.'))
        .map(str::to_string)
        .ok_or_else(|| IntakeError::InvalidFileName(filename.to_string()))
}
