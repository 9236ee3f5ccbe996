//! Builds one annotated text corpus from all of an employee's documents.
//!
//! Rebuilds are destructive: the previous aggregate is removed before any
//! new content is written. A crash mid-rebuild can therefore leave no
//! aggregate at all, and callers treat a missing aggregate as "needs
//! rebuild".

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;

use crate::error::{ProcessError, StorageError};
use crate::processor::{provenance, ConverterRegistry};
use crate::sanitize::redact_path;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Conversion of '{path}' failed: {source}")]
    Conversion {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub output: PathBuf,
    pub documents: usize,
    /// Characters of converted text, excluding provenance headers.
    pub content_chars: usize,
}

pub struct TextAggregator {
    registry: Arc<ConverterRegistry>,
}

impl TextAggregator {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Lists the convertible documents directly inside `dir`, in discovery
    /// order. A missing directory has no documents.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StorageError::ReadFile {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }

            if self.registry.supports_path(path) {
                sources.push(path.to_path_buf());
            } else {
                log::debug!("Skipping unsupported document: {}", path.display());
            }
        }

        Ok(sources)
    }

    /// Replaces `output` with the provenance-annotated text of every source.
    ///
    /// Any conversion failure aborts the rebuild; the partial aggregate is
    /// left behind and the caller must not record the new fingerprints.
    pub fn rebuild(
        &self,
        sources: &[PathBuf],
        output: &Path,
    ) -> Result<AggregateReport, AggregateError> {
        match std::fs::remove_file(output) {
            Ok(()) => log::debug!("Removed previous aggregate {}", output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::RemoveFile {
                    path: output.to_path_buf(),
                    source: e,
                }
                .into())
            }
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(output, b"").map_err(|e| StorageError::WriteFile {
            path: output.to_path_buf(),
            source: e,
        })?;

        let mut content_chars = 0;
        for source in sources {
            let _span =
                tracing::info_span!("aggregator.convert", file = %redact_path(source)).entered();

            let converted =
                self.registry
                    .convert(source)
                    .map_err(|e| AggregateError::Conversion {
                        path: source.clone(),
                        source: e,
                    })?;

            content_chars += converted.text.trim().chars().count();
            provenance::append_block(output, source, &converted.text)?;
        }

        log::info!(
            "Aggregated {} document(s) into {}",
            sources.len(),
            output.display()
        );

        Ok(AggregateReport {
            output: output.to_path_buf(),
            documents: sources.len(),
            content_chars,
        })
    }
}
