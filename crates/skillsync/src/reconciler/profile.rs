//! Full employee profiles, alone or as an `{employees: [...]}` batch.
//!
//! Unlike skill-only documents a profile may create its employee. The whole
//! file is applied in one transaction, batches included.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use serde_json::{Map, Value};

use super::error::{ImportError, ValidationError};
use super::importer::{apply_skills, AssociationMode, ImportSummary};
use super::validate::{parse_skill_entries, string_field, truthy, SkillEntry};
use crate::db::employee_repo::{self, NewEmployee, ProfileUpdate};
use crate::db::{department_repo, Database};

static RE_NOTES_BUSINESS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Business ID:\s*([^\s,;]+)").unwrap());
static RE_NOTES_ARABIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Arabic Name:\s*([^,\n]+)").unwrap());
static RE_NOTES_IS_ACTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Is Active:\s*(yes|no)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentRef {
    pub name: String,
    pub is_director: bool,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeProfile {
    pub business_id: String,
    pub english_name: String,
    pub arabic_name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub departments: Vec<DepartmentRef>,
    pub skills: Vec<SkillEntry>,
}

impl EmployeeProfile {
    /// Parses one profile. Fields missing from the object may be recovered
    /// from its free-text `notes`; explicit fields win.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotARecord)?;
        let notes = object.get("notes").and_then(Value::as_str).unwrap_or("");

        let business_id = string_field(object, "business_id")
            .or_else(|| capture(&RE_NOTES_BUSINESS_ID, notes))
            .ok_or(ValidationError::MissingBusinessId)?;
        let english_name = string_field(object, "english_name")
            .ok_or(ValidationError::MissingField("english_name"))?;

        let is_active = object.get("is_active").and_then(truthy).or_else(|| {
            capture(&RE_NOTES_IS_ACTIVE, notes).map(|v| v.eq_ignore_ascii_case("yes"))
        });

        let skills = match object.get("skills") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => parse_skill_entries(items)?.0,
            Some(_) => return Err(ValidationError::SkillsNotAList),
        };

        Ok(Self {
            business_id,
            english_name,
            arabic_name: string_field(object, "arabic_name")
                .or_else(|| capture(&RE_NOTES_ARABIC_NAME, notes)),
            email: string_field(object, "email"),
            is_active,
            departments: parse_departments(object),
            skills,
        })
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_departments(object: &Map<String, Value>) -> Vec<DepartmentRef> {
    let Some(Value::Array(items)) = object.get("departments") else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => {
                let name = name.trim();
                (!name.is_empty()).then(|| DepartmentRef {
                    name: name.to_string(),
                    is_director: false,
                    parent: None,
                })
            }
            Value::Object(dept) => string_field(dept, "name").map(|name| DepartmentRef {
                name,
                is_director: dept.get("is_director").and_then(truthy).unwrap_or(false),
                parent: string_field(dept, "parent"),
            }),
            _ => None,
        })
        .collect()
}

/// Creates or updates one employee from `profile`.
pub fn apply_profile(
    conn: &Connection,
    profile: &EmployeeProfile,
    mode: AssociationMode,
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();

    let employee = match employee_repo::find_by_business_id(conn, &profile.business_id)? {
        Some(existing) => {
            let changed = employee_repo::update_profile(
                conn,
                existing.id,
                &ProfileUpdate {
                    english_name: Some(profile.english_name.clone()),
                    arabic_name: profile.arabic_name.clone(),
                    email: profile.email.clone(),
                    is_active: profile.is_active,
                },
            )?;
            if changed {
                summary.employees_updated += 1;
            }
            existing
        }
        None => {
            if !employee_repo::is_valid_business_id(&profile.business_id) {
                return Err(ValidationError::InvalidBusinessId(profile.business_id.clone()).into());
            }
            let mut new = NewEmployee::new(profile.english_name.clone());
            new.arabic_name = profile.arabic_name.clone();
            new.email = profile.email.clone();
            new.is_active = profile.is_active.unwrap_or(true);
            summary.employees_created += 1;
            employee_repo::create_with_business_id(conn, &new, &profile.business_id)?
        }
    };

    for dept in &profile.departments {
        let (department, created) = department_repo::get_or_create(conn, &dept.name)?;
        if created {
            summary.departments_created += 1;
        }
        employee_repo::set_department(conn, employee.id, Some(department.id))?;

        if dept.is_director {
            department_repo::set_director(conn, department.id, employee.id)?;
        }
        if let Some(parent_name) = &dept.parent {
            let (parent, created) = department_repo::get_or_create(conn, parent_name)?;
            if created {
                summary.departments_created += 1;
            }
            department_repo::set_parent(conn, department.id, parent.id)?;
        }
    }

    let skills = apply_skills(conn, employee.id, &profile.skills, mode)?;
    summary.absorb(&skills);
    Ok(summary)
}

#[derive(Clone)]
pub struct ProfileImporter {
    db: Database,
    mode: AssociationMode,
}

impl ProfileImporter {
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

    /// Imports a single profile. Returns its business id with the summary.
    pub fn import_profile(&self, value: &Value) -> Result<(String, ImportSummary), ImportError> {
        let profile = EmployeeProfile::from_value(value)?;
        let summary = self
            .db
            .with_transaction(|tx| apply_profile(tx, &profile, self.mode))?;
        log::info!(
            "Imported profile {} ({} skill(s))",
            profile.business_id,
            profile.skills.len()
        );
        Ok((profile.business_id, summary))
    }

    /// Imports every profile of an `{employees: [...]}` batch, all or nothing.
    pub fn import_batch(&self, value: &Value) -> Result<ImportSummary, ImportError> {
        let items = value
            .get("employees")
            .and_then(Value::as_array)
            .ok_or_else(|| ValidationError::UnknownStructure("`employees` is not a list".to_string()))?;

        let profiles = items
            .iter()
            .map(EmployeeProfile::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        let summary = self.db.with_transaction(|tx| {
            let mut total = ImportSummary::default();
            for profile in &profiles {
                total.absorb(&apply_profile(tx, profile, self.mode)?);
            }
            Ok::<_, ImportError>(total)
        })?;

        log::info!("Imported batch of {} profile(s)", profiles.len());
        Ok(summary)
    }
}
