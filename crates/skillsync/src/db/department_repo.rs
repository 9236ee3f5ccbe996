//! Department repository used by the profile importer.

use rusqlite::{params, Connection, Row};

use super::{name_key, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentRow {
    pub id: i64,
    pub name: String,
    pub parent_department_id: Option<i64>,
    pub director_employee_id: Option<i64>,
}

impl DepartmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            parent_department_id: row.get("parent_department_id")?,
            director_employee_id: row.get("director_employee_id")?,
        })
    }
}

/// Finds a department by name, ignoring case.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<DepartmentRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM departments WHERE name_key = ?1")?;
    let mut rows = stmt.query_map(params![name_key(name)], DepartmentRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Returns the department named `name`, creating it if absent.
pub fn get_or_create(conn: &Connection, name: &str) -> Result<(DepartmentRow, bool), DatabaseError> {
    let display = name.trim();
    let inserted = conn.execute(
        "INSERT INTO departments (name, name_key) VALUES (?1, ?2)
         ON CONFLICT(name_key) DO NOTHING",
        params![display, name_key(display)],
    )?;

    let row = find_by_name(conn, display)?.ok_or_else(|| DatabaseError::IdentityConflict {
        entity: "department",
        name: display.to_string(),
    })?;
    Ok((row, inserted == 1))
}

/// Records `employee_id` as the department's director.
pub fn set_director(conn: &Connection, id: i64, employee_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE departments SET director_employee_id = ?2 WHERE id = ?1",
        params![id, employee_id],
    )?;
    Ok(())
}

/// Links a department under its parent. A department is never its own parent.
pub fn set_parent(conn: &Connection, id: i64, parent_id: i64) -> Result<(), DatabaseError> {
    if id == parent_id {
        return Ok(());
    }
    conn.execute(
        "UPDATE departments SET parent_department_id = ?2 WHERE id = ?1",
        params![id, parent_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_get_or_create_and_links() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (it, created) = get_or_create(conn, "IT")?;
            assert!(created);
            let (same, created) = get_or_create(conn, "it ")?;
            assert!(!created);
            assert_eq!(it.id, same.id);

            let (ops, _) = get_or_create(conn, "Operations")?;
            set_parent(conn, it.id, ops.id)?;
            set_parent(conn, ops.id, ops.id)?;

            let it = find_by_name(conn, "IT")?.unwrap();
            assert_eq!(it.parent_department_id, Some(ops.id));
            let ops = find_by_name(conn, "Operations")?.unwrap();
            assert_eq!(ops.parent_department_id, None);
            Ok(())
        })
        .unwrap();
    }
}
