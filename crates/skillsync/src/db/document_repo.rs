//! Employee document records.
//!
//! A stored document is either evidence for a skill (a certificate) or a
//! generic filed document, never both. The table keeps both type columns,
//! so decoding rejects any row that sets discriminators for both kinds.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::{name_key, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentKind {
    Certificate {
        skill: Option<String>,
        cert_type: Option<String>,
        issuing_organization: Option<String>,
        validity_months: Option<i64>,
    },
    General {
        doc_type: Option<String>,
    },
}

impl DocumentKind {
    fn discriminator(&self) -> &'static str {
        match self {
            DocumentKind::Certificate { .. } => "certificate",
            DocumentKind::General { .. } => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDocument {
    pub id: i64,
    pub employee_id: i64,
    pub file_path: String,
    pub uploaded_at: String,
    pub kind: DocumentKind,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub employee_id: i64,
    pub file_path: String,
    pub kind: DocumentKind,
}

const SELECT_DOCUMENT: &str = "SELECT d.id, d.employee_id, d.kind, d.file_path, d.uploaded_at,
        d.cert_type_id, d.doc_type_id, d.skill_name, d.issuing_organization,
        d.validity_period_months, ct.name AS cert_type, dt.name AS doc_type
     FROM employee_documents d
     LEFT JOIN certificate_types ct ON ct.id = d.cert_type_id
     LEFT JOIN document_types dt ON dt.id = d.doc_type_id";

struct RawDocument {
    id: i64,
    employee_id: i64,
    kind: String,
    file_path: String,
    uploaded_at: String,
    cert_type_id: Option<i64>,
    doc_type_id: Option<i64>,
    skill_name: Option<String>,
    issuing_organization: Option<String>,
    validity_period_months: Option<i64>,
    cert_type: Option<String>,
    doc_type: Option<String>,
}

impl RawDocument {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            employee_id: row.get("employee_id")?,
            kind: row.get("kind")?,
            file_path: row.get("file_path")?,
            uploaded_at: row.get("uploaded_at")?,
            cert_type_id: row.get("cert_type_id")?,
            doc_type_id: row.get("doc_type_id")?,
            skill_name: row.get("skill_name")?,
            issuing_organization: row.get("issuing_organization")?,
            validity_period_months: row.get("validity_period_months")?,
            cert_type: row.get("cert_type")?,
            doc_type: row.get("doc_type")?,
        })
    }

    fn into_document(self) -> Result<EmployeeDocument, DatabaseError> {
        let invalid = |reason: &str| DatabaseError::InvalidRow {
            entity: "employee_document",
            id: self.id,
            reason: reason.to_string(),
        };

        let has_certificate_fields = self.cert_type_id.is_some()
            || self.skill_name.is_some()
            || self.issuing_organization.is_some()
            || self.validity_period_months.is_some();

        let kind = match self.kind.as_str() {
            "certificate" if self.doc_type_id.is_none() => DocumentKind::Certificate {
                skill: self.skill_name.clone(),
                cert_type: self.cert_type.clone(),
                issuing_organization: self.issuing_organization.clone(),
                validity_months: self.validity_period_months,
            },
            "general" if !has_certificate_fields => DocumentKind::General {
                doc_type: self.doc_type.clone(),
            },
            "certificate" | "general" => {
                return Err(invalid(
                    "row carries both certificate and document-type fields",
                ))
            }
            other => return Err(invalid(&format!("unknown document kind '{}'", other))),
        };

        Ok(EmployeeDocument {
            id: self.id,
            employee_id: self.employee_id,
            file_path: self.file_path,
            uploaded_at: self.uploaded_at,
            kind,
        })
    }
}

fn get_or_create_type(conn: &Connection, table: &str, name: &str) -> Result<i64, DatabaseError> {
    let display = name.trim();
    conn.execute(
        &format!(
            "INSERT INTO {} (name, name_key) VALUES (?1, ?2) ON CONFLICT(name_key) DO NOTHING",
            table
        ),
        params![display, name_key(display)],
    )?;
    let id = conn.query_row(
        &format!("SELECT id FROM {} WHERE name_key = ?1", table),
        params![name_key(display)],
        |r| r.get(0),
    )?;
    Ok(id)
}

fn resolve_type(
    conn: &Connection,
    table: &str,
    name: Option<&str>,
) -> Result<Option<i64>, DatabaseError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => Ok(Some(get_or_create_type(conn, table, name)?)),
        None => Ok(None),
    }
}

/// Records a stored document for an employee.
pub fn insert(conn: &Connection, doc: &NewDocument) -> Result<EmployeeDocument, DatabaseError> {
    let uploaded_at = chrono::Utc::now().to_rfc3339();

    match &doc.kind {
        DocumentKind::Certificate {
            skill,
            cert_type,
            issuing_organization,
            validity_months,
        } => {
            let cert_type_id = resolve_type(conn, "certificate_types", cert_type.as_deref())?;
            conn.execute(
                "INSERT INTO employee_documents (employee_id, kind, cert_type_id, file_path,
                 uploaded_at, skill_name, issuing_organization, validity_period_months)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    doc.employee_id,
                    doc.kind.discriminator(),
                    cert_type_id,
                    doc.file_path,
                    uploaded_at,
                    skill,
                    issuing_organization,
                    validity_months,
                ],
            )?;
        }
        DocumentKind::General { doc_type } => {
            let doc_type_id = resolve_type(conn, "document_types", doc_type.as_deref())?;
            conn.execute(
                "INSERT INTO employee_documents (employee_id, kind, doc_type_id, file_path,
                 uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    doc.employee_id,
                    doc.kind.discriminator(),
                    doc_type_id,
                    doc.file_path,
                    uploaded_at,
                ],
            )?;
        }
    }

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(DatabaseError::InvalidRow {
        entity: "employee_document",
        id,
        reason: "row vanished after insert".to_string(),
    })
}

/// Finds a document by id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<EmployeeDocument>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{} WHERE d.id = ?1", SELECT_DOCUMENT))?;
    let mut rows = stmt.query_map(params![id], RawDocument::from_row)?;
    match rows.next() {
        Some(Ok(raw)) => Ok(Some(raw.into_document()?)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Lists an employee's documents, oldest first.
pub fn list_for_employee(
    conn: &Connection,
    employee_id: i64,
) -> Result<Vec<EmployeeDocument>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE d.employee_id = ?1 ORDER BY d.id",
        SELECT_DOCUMENT
    ))?;
    let raws = stmt
        .query_map(params![employee_id], RawDocument::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawDocument::into_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::employee_repo::{self, NewEmployee};
    use crate::db::Database;

    fn certificate() -> DocumentKind {
        DocumentKind::Certificate {
            skill: Some("AWS".to_string()),
            cert_type: Some("Professional".to_string()),
            issuing_organization: Some("Amazon".to_string()),
            validity_months: Some(36),
        }
    }

    #[test]
    fn test_insert_and_read_back_both_kinds() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let employee = employee_repo::create(conn, &NewEmployee::new("Alice"))?;

            let cert = insert(
                conn,
                &NewDocument {
                    employee_id: employee.id,
                    file_path: "/docs/aws.pdf".to_string(),
                    kind: certificate(),
                },
            )?;
            assert_eq!(cert.kind, certificate());

            let general = insert(
                conn,
                &NewDocument {
                    employee_id: employee.id,
                    file_path: "/docs/cv.pdf".to_string(),
                    kind: DocumentKind::General {
                        doc_type: Some("CV".to_string()),
                    },
                },
            )?;
            assert_eq!(
                general.kind,
                DocumentKind::General {
                    doc_type: Some("CV".to_string())
                }
            );

            let all = list_for_employee(conn, employee.id)?;
            assert_eq!(all.len(), 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_storage_rejects_mixed_row() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let employee = employee_repo::create(conn, &NewEmployee::new("Alice"))?;
            let result = conn.execute(
                "INSERT INTO employee_documents (employee_id, kind, file_path, uploaded_at, skill_name)
                 VALUES (?1, 'general', '/x.pdf', '2025-01-01', 'AWS')",
                params![employee.id],
            );
            assert!(result.is_err());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_decode_rejects_ambiguous_legacy_row() {
        let raw = RawDocument {
            id: 7,
            employee_id: 1,
            kind: "general".to_string(),
            file_path: "/x.pdf".to_string(),
            uploaded_at: "2025-01-01".to_string(),
            cert_type_id: Some(1),
            doc_type_id: Some(2),
            skill_name: None,
            issuing_organization: None,
            validity_period_months: None,
            cert_type: Some("Professional".to_string()),
            doc_type: Some("CV".to_string()),
        };
        match raw.into_document() {
            Err(DatabaseError::InvalidRow { id, .. }) => assert_eq!(id, 7),
            other => panic!("expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn test_document_kind_serializes_tagged() {
        let json = serde_json::to_value(DocumentKind::General {
            doc_type: Some("Contract".to_string()),
        })
        .unwrap();
        assert_eq!(json["kind"], "general");
        assert_eq!(json["doc_type"], "Contract");
    }
}
