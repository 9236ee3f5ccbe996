//! Reconciliation of structured skill documents against the database.
//!
//! Three document shapes are accepted: skill-only `{business_id, skills}`
//! documents (from extraction or dropped into staging), single employee
//! profiles, and `{employees: [...]}` batches. Every file is applied in one
//! transaction and ends either archived or quarantined.

pub mod error;
pub mod importer;
pub mod profile;
pub mod validate;

use std::path::{Path, PathBuf};

use serde_json::Value;

pub use error::{ImportError, ValidationError};
pub use importer::{AssociationMode, ImportSummary, SkillImporter};
pub use profile::{EmployeeProfile, ProfileImporter};
pub use validate::{SkillDocument, SkillEntry};

use crate::db::Database;
use crate::sanitize::redact_path;
use crate::storage::{Archive, QuarantineReport};

/// Label used in archive names for batch files, which have no single owner.
pub const BATCH_LABEL: &str = "batch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    SkillOnly,
    Profile,
    Batch,
}

/// Decides which importer handles `value`.
///
/// Anything carrying profile fields is a profile; any other object is
/// treated as a skill-only document and left to its validation rules.
pub fn classify(value: &Value) -> Result<DocumentShape, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotARecord)?;

    if let Some(employees) = object.get("employees") {
        return if employees.is_array() {
            Ok(DocumentShape::Batch)
        } else {
            Err(ValidationError::UnknownStructure(
                "`employees` is not a list".to_string(),
            ))
        };
    }

    let is_profile = ["english_name", "departments", "notes"]
        .iter()
        .any(|key| object.contains_key(*key));

    Ok(if is_profile {
        DocumentShape::Profile
    } else {
        DocumentShape::SkillOnly
    })
}

/// Final resting state of one imported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Archived {
        business_id: String,
        summary: ImportSummary,
        /// `None` if the changes were committed but the archive copy failed.
        archived_to: Option<PathBuf>,
    },
    Quarantined {
        reason: String,
    },
}

impl ImportOutcome {
    pub fn is_archived(&self) -> bool {
        matches!(self, ImportOutcome::Archived { .. })
    }
}

/// Routes documents to the right importer and finalizes source files.
#[derive(Clone)]
pub struct Dispatcher {
    skills: SkillImporter,
    profiles: ProfileImporter,
    archive_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(db: Database, archive_dir: impl Into<PathBuf>, mode: AssociationMode) -> Self {
        Self {
            skills: SkillImporter::new(db.clone()).with_mode(mode),
            profiles: ProfileImporter::new(db).with_mode(mode),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn skills(&self) -> &SkillImporter {
        &self.skills
    }

    /// Imports an in-memory document. Returns the owning business id (or
    /// [`BATCH_LABEL`]) and what changed.
    pub fn import_value(&self, value: &Value) -> Result<(String, ImportSummary), ImportError> {
        match classify(value)? {
            DocumentShape::SkillOnly => self.skills.import_value(value),
            DocumentShape::Profile => self.profiles.import_profile(value),
            DocumentShape::Batch => Ok((BATCH_LABEL.to_string(), self.profiles.import_batch(value)?)),
        }
    }

    /// Imports the JSON file at `path`.
    ///
    /// Success copies the file into the archive. Any failure is recorded in
    /// `report`. The source file is never modified either way.
    pub fn import_file(&self, path: &Path, report: &QuarantineReport) -> ImportOutcome {
        let _span = tracing::info_span!("reconcile.file", file = %redact_path(path)).entered();

        match read_json(path).and_then(|value| self.import_value(&value)) {
            Ok((business_id, summary)) => {
                let archived_to = match Archive::new(&self.archive_dir).store(path, &business_id) {
                    Ok(archived) => Some(archived),
                    Err(e) => {
                        log::error!(
                            "Changes from {} committed but archiving failed: {}",
                            redact_path(path),
                            e
                        );
                        None
                    }
                };
                ImportOutcome::Archived {
                    business_id,
                    summary,
                    archived_to,
                }
            }
            Err(e) => {
                let reason = e.to_string();
                if let Err(report_err) = report.record(path, &reason, e.suggested_action()) {
                    log::error!(
                        "Failed to record quarantine of {}: {}",
                        redact_path(path),
                        report_err
                    );
                }
                ImportOutcome::Quarantined { reason }
            }
        }
    }
}

/// Reads and parses a JSON file.
pub fn read_json(path: &Path) -> Result<Value, ImportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ImportError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ImportError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
