//! Skill, category and employee↔skill association repository.
//!
//! Names are matched through the `name_key` column (trimmed, lower-cased),
//! which carries a UNIQUE constraint. Create-if-absent is an
//! `INSERT .. ON CONFLICT DO NOTHING` followed by a fetch, so two writers
//! racing on the same name both end up with the single winning row.

use rusqlite::{params, Connection, Row};

use super::{name_key, DatabaseError};

/// Category assigned when none is supplied or the supplied one is unusable.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Level stored when an association is created without one.
pub const LEVEL_NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
}

impl CategoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRow {
    pub id: i64,
    pub name: String,
    pub category_id: Option<i64>,
}

impl SkillRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            category_id: row.get("category_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeSkillRow {
    pub employee_id: i64,
    pub skill_id: i64,
    pub skill_level: String,
    pub certified: bool,
    pub years_experience: Option<i64>,
    pub last_used_date: Option<String>,
}

impl EmployeeSkillRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            employee_id: row.get("employee_id")?,
            skill_id: row.get("skill_id")?,
            skill_level: row.get("skill_level")?,
            certified: row.get("certified")?,
            years_experience: row.get("years_experience")?,
            last_used_date: row.get("last_used_date")?,
        })
    }
}

/// Association metadata as supplied by an import. `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationFields {
    pub level: Option<String>,
    pub certified: Option<bool>,
    pub years_experience: Option<i64>,
    pub last_used_date: Option<String>,
}

/// One row of an employee's skill listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeSkillView {
    pub skill: String,
    pub category: Option<String>,
    pub level: String,
    pub certified: bool,
}

/// Finds a category by name, ignoring case and surrounding whitespace.
pub fn find_category(conn: &Connection, name: &str) -> Result<Option<CategoryRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM skill_categories WHERE name_key = ?1")?;
    let mut rows = stmt.query_map(params![name_key(name)], CategoryRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Returns the category named `name`, creating it if absent.
///
/// The boolean is true when this call created the row.
pub fn get_or_create_category(
    conn: &Connection,
    name: &str,
) -> Result<(CategoryRow, bool), DatabaseError> {
    let display = name.trim();
    let inserted = conn.execute(
        "INSERT INTO skill_categories (name, name_key) VALUES (?1, ?2)
         ON CONFLICT(name_key) DO NOTHING",
        params![display, name_key(display)],
    )?;

    let row = find_category(conn, display)?.ok_or_else(|| DatabaseError::IdentityConflict {
        entity: "category",
        name: display.to_string(),
    })?;
    Ok((row, inserted == 1))
}

/// Finds a skill by name, ignoring case and surrounding whitespace.
pub fn find_skill(conn: &Connection, name: &str) -> Result<Option<SkillRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, category_id FROM skills WHERE name_key = ?1")?;
    let mut rows = stmt.query_map(params![name_key(name)], SkillRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Returns the skill named `name`, creating it under `category_id` if absent.
///
/// An existing skill keeps its category, unless it has none, in which case
/// it is attached to `category_id`.
pub fn get_or_create_skill(
    conn: &Connection,
    name: &str,
    category_id: i64,
) -> Result<(SkillRow, bool), DatabaseError> {
    let display = name.trim();
    let inserted = conn.execute(
        "INSERT INTO skills (name, name_key, category_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(name_key) DO NOTHING",
        params![display, name_key(display), category_id],
    )?;

    let mut row = find_skill(conn, display)?.ok_or_else(|| DatabaseError::IdentityConflict {
        entity: "skill",
        name: display.to_string(),
    })?;

    if row.category_id.is_none() {
        conn.execute(
            "UPDATE skills SET category_id = ?2 WHERE id = ?1",
            params![row.id, category_id],
        )?;
        row.category_id = Some(category_id);
    }

    Ok((row, inserted == 1))
}

/// Finds the association between an employee and a skill.
pub fn find_association(
    conn: &Connection,
    employee_id: i64,
    skill_id: i64,
) -> Result<Option<EmployeeSkillRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM employee_skills WHERE employee_id = ?1 AND skill_id = ?2",
    )?;
    let mut rows = stmt.query_map(params![employee_id, skill_id], EmployeeSkillRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Inserts an association, defaulting level and certification.
///
/// Returns false if the pair already existed; the existing row is untouched.
pub fn insert_association(
    conn: &Connection,
    employee_id: i64,
    skill_id: i64,
    fields: &AssociationFields,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO employee_skills
             (employee_id, skill_id, skill_level, certified, years_experience, last_used_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(employee_id, skill_id) DO NOTHING",
        params![
            employee_id,
            skill_id,
            fields.level.as_deref().unwrap_or(LEVEL_NOT_SPECIFIED),
            fields.certified.unwrap_or(false),
            fields.years_experience,
            fields.last_used_date,
        ],
    )?;
    Ok(inserted == 1)
}

/// Refreshes the supplied metadata fields of an existing association.
pub fn update_association(
    conn: &Connection,
    employee_id: i64,
    skill_id: i64,
    fields: &AssociationFields,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE employee_skills SET
             skill_level = COALESCE(?3, skill_level),
             certified = COALESCE(?4, certified),
             years_experience = COALESCE(?5, years_experience),
             last_used_date = COALESCE(?6, last_used_date)
         WHERE employee_id = ?1 AND skill_id = ?2",
        params![
            employee_id,
            skill_id,
            fields.level,
            fields.certified,
            fields.years_experience,
            fields.last_used_date,
        ],
    )?;
    Ok(())
}

/// Lists an employee's skills with their category names, ordered by skill name.
pub fn list_for_employee(
    conn: &Connection,
    employee_id: i64,
) -> Result<Vec<EmployeeSkillView>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT s.name AS skill, c.name AS category, es.skill_level, es.certified
         FROM employee_skills es
         JOIN skills s ON s.id = es.skill_id
         LEFT JOIN skill_categories c ON c.id = s.category_id
         WHERE es.employee_id = ?1
         ORDER BY s.name_key",
    )?;
    let rows = stmt
        .query_map(params![employee_id], |row| {
            Ok(EmployeeSkillView {
                skill: row.get("skill")?,
                category: row.get("category")?,
                level: row.get("skill_level")?,
                certified: row.get("certified")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts rows in the skill-related tables: (categories, skills, associations).
pub fn table_counts(conn: &Connection) -> Result<(u64, u64, u64), DatabaseError> {
    let categories: u64 =
        conn.query_row("SELECT COUNT(*) FROM skill_categories", [], |r| r.get(0))?;
    let skills: u64 = conn.query_row("SELECT COUNT(*) FROM skills", [], |r| r.get(0))?;
    let associations: u64 =
        conn.query_row("SELECT COUNT(*) FROM employee_skills", [], |r| r.get(0))?;
    Ok((categories, skills, associations))
}
