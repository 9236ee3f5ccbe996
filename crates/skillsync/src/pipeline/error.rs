use std::path::PathBuf;

use thiserror::Error;

use crate::aggregator::AggregateError;
use crate::db::DatabaseError;
use crate::error::{ProcessError, StorageError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No employee with id {id}")]
    EmployeeNotFound { id: i64 },

    #[error("Conversion of '{path}' failed: {source}")]
    Conversion {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Database failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Fingerprint record could not be updated: {0}")]
    Fingerprint(#[source] StorageError),
}

impl From<AggregateError> for PipelineError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Conversion { path, source } => PipelineError::Conversion { path, source },
            AggregateError::Storage(e) => PipelineError::Storage(e),
        }
    }
}
