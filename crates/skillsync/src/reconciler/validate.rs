//! Structural validation of skill documents.
//!
//! The rules separate "wrong file" (not an object, no `skills`, `skills`
//! not a list) from "extraction produced nothing" (a non-empty list in
//! which no entry has a name). A present but empty list is valid.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::error::ValidationError;
use crate::db::skill_repo::AssociationFields;

/// One usable skill entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillEntry {
    pub name: String,
    pub category: Option<String>,
    pub fields: AssociationFields,
}

/// A validated `{business_id, skills: [...]}` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDocument {
    pub business_id: String,
    pub skills: Vec<SkillEntry>,
    /// Entries dropped for lack of a name.
    pub skipped: usize,
}

impl SkillDocument {
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotARecord)?;

        let raw_skills = match object.get("skills") {
            None => return Err(ValidationError::MissingSkills),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ValidationError::SkillsNotAList),
        };

        let business_id =
            string_field(object, "business_id").ok_or(ValidationError::MissingBusinessId)?;
        let (skills, skipped) = parse_skill_entries(raw_skills)?;

        Ok(Self {
            business_id,
            skills,
            skipped,
        })
    }
}

/// Parses skill entries, dropping nameless ones.
///
/// Fails with `NoUsableSkills` only when the list is non-empty and nothing
/// survives.
pub fn parse_skill_entries(items: &[Value]) -> Result<(Vec<SkillEntry>, usize), ValidationError> {
    let skills: Vec<SkillEntry> = items.iter().filter_map(parse_entry).collect();
    let skipped = items.len() - skills.len();

    if !items.is_empty() && skills.is_empty() {
        return Err(ValidationError::NoUsableSkills {
            entries: items.len(),
        });
    }
    if skipped > 0 {
        log::debug!("Dropped {} skill entries without a name", skipped);
    }

    Ok((skills, skipped))
}

fn parse_entry(item: &Value) -> Option<SkillEntry> {
    match item {
        Value::String(name) => non_blank(name).map(|name| SkillEntry {
            name,
            category: None,
            fields: AssociationFields::default(),
        }),
        Value::Object(entry) => {
            let name = string_field(entry, "name").or_else(|| string_field(entry, "skill"))?;
            Some(SkillEntry {
                name,
                category: string_field(entry, "category"),
                fields: AssociationFields {
                    level: entry.get("level").and_then(level_value),
                    certified: entry.get("certified").and_then(truthy),
                    years_experience: entry.get("years_experience").and_then(whole_number),
                    last_used_date: entry
                        .get("last_used")
                        .or_else(|| entry.get("last_used_date"))
                        .and_then(date_value),
                },
            })
        }
        _ => None,
    }
}

/// Trimmed, non-empty string field.
pub(crate) fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).and_then(non_blank)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn level_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts booleans, 0/1 and the usual yes/no spellings.
pub(crate) fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn whole_number(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    };
    number.filter(|years| *years >= 0)
}

fn date_value(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
        Err(_) => {
            log::debug!("Ignoring unparsable last-used date '{}'", raw);
            None
        }
    }
}
