//! Skill reconciliation: resolve names to rows and upsert associations.

use rusqlite::Connection;
use serde_json::Value;

use super::error::ImportError;
use super::validate::{SkillDocument, SkillEntry};
use crate::db::skill_repo::{self, CategoryRow, UNCATEGORIZED};
use crate::db::{employee_repo, Database, DatabaseError};

/// What to do when an (employee, skill) association already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssociationMode {
    /// Leave the existing row untouched.
    #[default]
    KeepExisting,
    /// Refresh the metadata fields the document supplies.
    UpdateInPlace,
}

impl AssociationMode {
    pub fn from_update_existing(update_existing: bool) -> Self {
        if update_existing {
            Self::UpdateInPlace
        } else {
            Self::KeepExisting
        }
    }
}

/// Row-level effect of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub employees_created: usize,
    pub employees_updated: usize,
    pub departments_created: usize,
    pub categories_created: usize,
    pub skills_created: usize,
    pub associations_added: usize,
    pub associations_updated: usize,
    pub associations_unchanged: usize,
}

impl ImportSummary {
    pub fn absorb(&mut self, other: &ImportSummary) {
        self.employees_created += other.employees_created;
        self.employees_updated += other.employees_updated;
        self.departments_created += other.departments_created;
        self.categories_created += other.categories_created;
        self.skills_created += other.skills_created;
        self.associations_added += other.associations_added;
        self.associations_updated += other.associations_updated;
        self.associations_unchanged += other.associations_unchanged;
    }

    /// True if the import changed nothing in the database.
    pub fn is_noop(&self) -> bool {
        self.employees_created == 0
            && self.employees_updated == 0
            && self.departments_created == 0
            && self.categories_created == 0
            && self.skills_created == 0
            && self.associations_added == 0
            && self.associations_updated == 0
    }
}

/// Applies `doc` on `conn`.
///
/// The employee is looked up strictly by business id and never created
/// here. Run this inside a transaction: an error part-way leaves earlier
/// statements for the caller to roll back.
pub fn apply(
    conn: &Connection,
    doc: &SkillDocument,
    mode: AssociationMode,
) -> Result<ImportSummary, ImportError> {
    let employee = employee_repo::find_by_business_id(conn, &doc.business_id)?.ok_or_else(|| {
        ImportError::EmployeeNotFound {
            business_id: doc.business_id.clone(),
        }
    })?;

    Ok(apply_skills(conn, employee.id, &doc.skills, mode)?)
}

/// Reconciles `skills` for one employee.
pub fn apply_skills(
    conn: &Connection,
    employee_id: i64,
    skills: &[SkillEntry],
    mode: AssociationMode,
) -> Result<ImportSummary, DatabaseError> {
    let mut summary = ImportSummary::default();

    for entry in skills {
        let category = resolve_category(conn, entry.category.as_deref(), &mut summary)?;

        let (skill, created) = skill_repo::get_or_create_skill(conn, &entry.name, category.id)?;
        if created {
            log::debug!("Created skill '{}' in '{}'", skill.name, category.name);
            summary.skills_created += 1;
        }

        if skill_repo::insert_association(conn, employee_id, skill.id, &entry.fields)? {
            summary.associations_added += 1;
        } else if mode == AssociationMode::UpdateInPlace {
            skill_repo::update_association(conn, employee_id, skill.id, &entry.fields)?;
            summary.associations_updated += 1;
        } else {
            summary.associations_unchanged += 1;
        }
    }

    Ok(summary)
}

/// Supplied name if usable, otherwise the sentinel category. A supplied name
/// whose creation still finds no row falls back to the sentinel too.
fn resolve_category(
    conn: &Connection,
    name: Option<&str>,
    summary: &mut ImportSummary,
) -> Result<CategoryRow, DatabaseError> {
    if let Some(name) = name {
        match skill_repo::get_or_create_category(conn, name) {
            Ok((row, created)) => {
                if created {
                    summary.categories_created += 1;
                }
                return Ok(row);
            }
            Err(DatabaseError::IdentityConflict { .. }) => {
                log::warn!("Category '{}' could not be resolved, using {}", name, UNCATEGORIZED);
            }
            Err(e) => return Err(e),
        }
    }

    let (row, created) = skill_repo::get_or_create_category(conn, UNCATEGORIZED)?;
    if created {
        summary.categories_created += 1;
    }
    Ok(row)
}

/// Validates and applies skill-only documents, one transaction each.
#[derive(Clone)]
pub struct SkillImporter {
    db: Database,
    mode: AssociationMode,
}

impl SkillImporter {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            mode: AssociationMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: AssociationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> AssociationMode {
        self.mode
    }

    /// Applies a validated document in its own transaction.
    pub fn import_document(&self, doc: &SkillDocument) -> Result<ImportSummary, ImportError> {
        let summary = self.db.with_transaction(|tx| apply(tx, doc, self.mode))?;

        log::info!(
            "Reconciled {} skill(s) for {}: {} added, {} updated, {} unchanged",
            doc.skills.len(),
            doc.business_id,
            summary.associations_added,
            summary.associations_updated,
            summary.associations_unchanged
        );
        Ok(summary)
    }

    /// Validates `value` and applies it. Returns the business id with the summary.
    pub fn import_value(&self, value: &Value) -> Result<(String, ImportSummary), ImportError> {
        let doc = SkillDocument::from_value(value)?;
        let summary = self.import_document(&doc)?;
        Ok((doc.business_id, summary))
    }
}
