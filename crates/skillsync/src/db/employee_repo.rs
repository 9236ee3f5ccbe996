//! Employee repository: lookups, creation with generated business ids, and
//! the profile fields the importers are allowed to touch.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use rusqlite::{params, Connection, Row};

use super::DatabaseError;

static RE_BUSINESS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^BIZ(\d{4})-(\d{4,})$").unwrap());

/// A raw employee row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeRow {
    pub id: i64,
    pub business_id: String,
    pub english_name: String,
    pub arabic_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub department_id: Option<i64>,
    pub created_at: String,
}

impl EmployeeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            business_id: row.get("business_id")?,
            english_name: row.get("english_name")?,
            arabic_name: row.get("arabic_name")?,
            email: row.get("email")?,
            is_active: row.get("is_active")?,
            department_id: row.get("department_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields supplied when creating an employee.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub english_name: String,
    pub arabic_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub department_id: Option<i64>,
}

impl NewEmployee {
    pub fn new(english_name: impl Into<String>) -> Self {
        Self {
            english_name: english_name.into(),
            arabic_name: None,
            email: None,
            is_active: true,
            department_id: None,
        }
    }
}

/// Returns true if `value` has the `BIZ<year>-<sequence>` shape.
pub fn is_valid_business_id(value: &str) -> bool {
    RE_BUSINESS_ID.is_match(value)
}

/// Formats a business id from its year and sequence number.
pub fn format_business_id(year: i32, sequence: u32) -> String {
    format!("BIZ{}-{:04}", year, sequence)
}

/// Computes the next free business id for `year`.
///
/// Must run on the same transaction as the insert that uses it; the UNIQUE
/// constraint on `business_id` rejects a concurrent duplicate.
pub fn next_business_id(conn: &Connection, year: i32) -> Result<String, DatabaseError> {
    let prefix = format!("BIZ{}-", year);
    let mut stmt = conn.prepare("SELECT business_id FROM employees WHERE business_id LIKE ?1")?;
    let ids = stmt
        .query_map(params![format!("{}%", prefix)], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let highest = ids
        .iter()
        .filter_map(|id| RE_BUSINESS_ID.captures(id))
        .filter_map(|caps| caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()))
        .max()
        .unwrap_or(0);

    let next = highest
        .checked_add(1)
        .ok_or(DatabaseError::SequenceExhausted { year })?;
    Ok(format_business_id(year, next))
}

/// Creates an employee with a freshly generated business id for the current year.
pub fn create(conn: &Connection, employee: &NewEmployee) -> Result<EmployeeRow, DatabaseError> {
    let business_id = next_business_id(conn, Utc::now().year())?;
    create_with_business_id(conn, employee, &business_id)
}

/// Creates an employee under a business id issued elsewhere (e.g. an imported profile).
pub fn create_with_business_id(
    conn: &Connection,
    employee: &NewEmployee,
    business_id: &str,
) -> Result<EmployeeRow, DatabaseError> {
    conn.execute(
        "INSERT INTO employees (business_id, english_name, arabic_name, email, is_active,
         department_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            business_id,
            employee.english_name,
            employee.arabic_name,
            employee.email,
            employee.is_active,
            employee.department_id,
            Utc::now().to_rfc3339(),
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(DatabaseError::InvalidRow {
        entity: "employee",
        id,
        reason: "row vanished after insert".to_string(),
    })
}

/// Finds an employee by internal id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<EmployeeRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM employees WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], EmployeeRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Finds an employee strictly by business id (surrounding whitespace ignored).
pub fn find_by_business_id(
    conn: &Connection,
    business_id: &str,
) -> Result<Option<EmployeeRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM employees WHERE business_id = ?1")?;
    let mut rows = stmt.query_map(params![business_id.trim()], EmployeeRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Profile fields an import may overwrite. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub english_name: Option<String>,
    pub arabic_name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

/// Applies a partial profile update.
///
/// Returns false when every set field already holds its value, in which case
/// no row is touched.
pub fn update_profile(
    conn: &Connection,
    id: i64,
    update: &ProfileUpdate,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE employees SET
             english_name = COALESCE(?2, english_name),
             arabic_name = COALESCE(?3, arabic_name),
             email = COALESCE(?4, email),
             is_active = COALESCE(?5, is_active)
         WHERE id = ?1
           AND (COALESCE(?2, english_name) IS NOT english_name
                OR COALESCE(?3, arabic_name) IS NOT arabic_name
                OR COALESCE(?4, email) IS NOT email
                OR COALESCE(?5, is_active) IS NOT is_active)",
        params![
            id,
            update.english_name,
            update.arabic_name,
            update.email,
            update.is_active,
        ],
    )?;
    Ok(changed > 0)
}

/// Points an employee at a department.
pub fn set_department(
    conn: &Connection,
    id: i64,
    department_id: Option<i64>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE employees SET department_id = ?2 WHERE id = ?1",
        params![id, department_id],
    )?;
    Ok(())
}

/// Deletes an employee. Associations and document rows cascade.
pub fn delete(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let affected = conn.execute("DELETE FROM employees WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}
