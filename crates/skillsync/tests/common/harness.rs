//! Test harness for isolated test execution.
//!
//! The `TestHarness` owns a temporary directory laid out like a deployment
//! (employee documents, converted corpora, staging, processed) plus an
//! in-memory database, and wires up the components under test.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::Value;

use skillsync::db::employee_repo::{self, EmployeeRow, NewEmployee};
use skillsync::db::skill_repo::{self, EmployeeSkillView};
use skillsync::db::Database;
use skillsync::reconciler::Dispatcher;
use skillsync::storage::QuarantineReport;
use skillsync::{EnrichmentPipeline, ExtractionClient, PipelineConfig, StagingScanner};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub config: Arc<PipelineConfig>,
}

impl TestHarness {
    /// Default layout; every corpus is sent to the extraction client,
    /// however short.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config<F>(adjust: F) -> Self
    where
        F: FnOnce(&mut PipelineConfig),
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = PipelineConfig::rooted_at(temp_dir.path());
        config.min_corpus_chars = 0;
        adjust(&mut config);

        temp_dir
            .child("converted/json_files")
            .create_dir_all()
            .expect("Failed to create staging dir");

        Self {
            temp_dir,
            db: Database::open_in_memory().expect("Failed to open database"),
            config: Arc::new(config),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn add_employee(&self, english_name: &str) -> EmployeeRow {
        self.db
            .with_conn(|conn| employee_repo::create(conn, &NewEmployee::new(english_name)))
            .expect("Failed to create employee")
    }

    pub fn add_employee_with_id(&self, english_name: &str, business_id: &str) -> EmployeeRow {
        self.db
            .with_conn(|conn| {
                employee_repo::create_with_business_id(
                    conn,
                    &NewEmployee::new(english_name),
                    business_id,
                )
            })
            .expect("Failed to create employee")
    }

    pub fn find_employee(&self, business_id: &str) -> Option<EmployeeRow> {
        self.db
            .with_conn(|conn| employee_repo::find_by_business_id(conn, business_id))
            .expect("Failed to query employee")
    }

    /// Writes a source document into the employee's documents folder.
    pub fn write_document(&self, business_id: &str, filename: &str, content: &[u8]) -> PathBuf {
        let child = self
            .temp_dir
            .child(format!("employee_documents/{}/documents/{}", business_id, filename));
        child.write_binary(content).expect("Failed to write document");
        child.path().to_path_buf()
    }

    /// Drops a structured file into the staging directory.
    pub fn stage(&self, filename: &str, document: &Value) -> PathBuf {
        self.stage_raw(filename, &document.to_string())
    }

    pub fn stage_raw(&self, filename: &str, content: &str) -> PathBuf {
        let child = self
            .temp_dir
            .child(format!("converted/json_files/{}", filename));
        child.write_str(content).expect("Failed to write staging file");
        child.path().to_path_buf()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.db.clone(),
            &self.config.processed_directory,
            self.config.association_mode,
        )
    }

    pub fn quarantine_report(&self) -> QuarantineReport {
        QuarantineReport::new(self.config.quarantine_directory(), false)
    }

    pub fn pipeline(&self, client: Arc<dyn ExtractionClient>) -> EnrichmentPipeline {
        EnrichmentPipeline::new(Arc::clone(&self.config), self.db.clone(), client)
    }

    pub fn scanner(&self) -> StagingScanner {
        StagingScanner::new(
            &self.config.staging_directory,
            self.config.quarantine_directory(),
            self.config.staging_ledger_path(),
            self.dispatcher(),
        )
        .expect("Failed to create scanner")
    }

    pub fn skills_of(&self, employee_id: i64) -> Vec<EmployeeSkillView> {
        self.db
            .with_conn(|conn| skill_repo::list_for_employee(conn, employee_id))
            .expect("Failed to list skills")
    }

    pub fn skill_names(&self, employee_id: i64) -> Vec<String> {
        let mut names: Vec<String> = self
            .skills_of(employee_id)
            .into_iter()
            .map(|view| view.skill)
            .collect();
        names.sort();
        names
    }

    /// `(categories, skills, associations)` row counts.
    pub fn counts(&self) -> (u64, u64, u64) {
        self.db
            .with_conn(skill_repo::table_counts)
            .expect("Failed to count rows")
    }

    /// Files directly inside the processed (archive) directory.
    pub fn archived_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.processed_directory) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| p.file_name().is_some_and(|n| n != "staging_meta.json"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Quarantine report files written so far.
    pub fn quarantine_reports(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.config.quarantine_directory()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("quarantine_report_"))
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
