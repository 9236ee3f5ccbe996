use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;

/// A document that is structurally wrong for reconciliation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Document is not a JSON object")]
    NotARecord,

    #[error("Document has no `skills` field")]
    MissingSkills,

    #[error("`skills` is not a list")]
    SkillsNotAList,

    #[error("None of the {entries} skill entries has a usable name")]
    NoUsableSkills { entries: usize },

    #[error("Missing business_id")]
    MissingBusinessId,

    #[error("Invalid business_id '{0}' (expected BIZ<year>-<sequence>)")]
    InvalidBusinessId(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown document structure: {0}")]
    UnknownStructure(String),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No employee found for business_id: {business_id}")]
    EmployeeNotFound { business_id: String },

    #[error("Database error, changes rolled back: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}' as JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ImportError {
    /// Operator guidance written to the quarantine report.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            ImportError::Validation(ValidationError::NoUsableSkills { .. }) => {
                "Re-run extraction for this employee or add skill names to the file"
            }
            ImportError::Validation(ValidationError::MissingBusinessId)
            | ImportError::Validation(ValidationError::InvalidBusinessId(_)) => {
                "Add the employee's business_id (BIZ<year>-<sequence>) to the file"
            }
            ImportError::Validation(ValidationError::MissingField(_)) => {
                "Fill in the missing profile field and re-run"
            }
            ImportError::Validation(_) => "Check format and structure of the file",
            ImportError::EmployeeNotFound { .. } => {
                "Create the employee first or correct the business_id"
            }
            ImportError::Persistence(_) => "Check database integrity, then re-run the import",
            ImportError::Read { .. } | ImportError::Parse { .. } => {
                "Check that the file is complete, UTF-8 encoded JSON"
            }
        }
    }
}
