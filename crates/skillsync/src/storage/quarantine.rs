//! Non-destructive failure handling.
//!
//! A quarantined file is never moved or rewritten. Instead a block is
//! appended to the run's report, and optionally an annotated debug copy is
//! written next to it. Quarantining the same unfixed file on every pass just
//! produces the same diagnostic again.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use uuid::Uuid;

use super::{create_exclusive, ensure_directory, split_name};
use crate::error::StorageError;

/// One failure as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineEntry {
    pub file: String,
    pub reason: String,
    pub suggested_action: String,
}

/// The quarantine report for one run (a bulk pass or a pipeline run).
///
/// The report file is created on the first recorded failure, so clean runs
/// leave nothing behind.
pub struct QuarantineReport {
    directory: PathBuf,
    run_started: DateTime<Local>,
    run_id: String,
    debug_copies: bool,
    state: Mutex<ReportState>,
}

#[derive(Default)]
struct ReportState {
    path: Option<PathBuf>,
    entries: Vec<QuarantineEntry>,
}

impl QuarantineReport {
    pub fn new<P: AsRef<Path>>(directory: P, debug_copies: bool) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        Self {
            directory: directory.as_ref().to_path_buf(),
            run_started: Local::now(),
            run_id: run_id[..6].to_string(),
            debug_copies,
            state: Mutex::new(ReportState::default()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the report file, once something has been recorded.
    pub fn report_path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    pub fn entries(&self) -> Vec<QuarantineEntry> {
        self.lock().entries.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Records a failure for `source`.
    pub fn record(
        &self,
        source: &Path,
        reason: &str,
        suggested_action: &str,
    ) -> Result<(), StorageError> {
        let entry = QuarantineEntry {
            file: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.display().to_string()),
            reason: reason.to_string(),
            suggested_action: suggested_action.to_string(),
        };

        let mut state = self.lock();
        let path = match &state.path {
            Some(path) => path.clone(),
            None => {
                let path = self.create_report()?;
                state.path = Some(path.clone());
                path
            }
        };

        let block = format!(
            "File: {}\nReason: {}\nSuggested Action: {}\n---\n",
            entry.file, entry.reason, entry.suggested_action
        );
        append(&path, &block)?;
        log::warn!("Quarantined {}: {}", entry.file, entry.reason);

        if self.debug_copies {
            self.write_debug_copy(source, reason);
        }

        state.entries.push(entry);
        Ok(())
    }

    fn create_report(&self) -> Result<PathBuf, StorageError> {
        ensure_directory(&self.directory)?;
        let filename = format!(
            "quarantine_report_{}_{}.txt",
            self.run_started.format("%Y%m%d_%H%M%S"),
            self.run_id
        );
        let header = format!(
            "Quarantine report (run started {})\n\n",
            self.run_started.format("%Y-%m-%d %H:%M:%S")
        );
        create_exclusive(&self.directory, &filename, header.as_bytes())
    }

    /// Best effort: a failed debug copy is logged, the report entry stands.
    fn write_debug_copy(&self, source: &Path, reason: &str) {
        let content = match std::fs::read(source) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("No debug copy for {}: {}", source.display(), e);
                return;
            }
        };

        let (stem, ext) = split_name(source);
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = match ext {
            Some(ext) => format!("{}_ERROR_{}.{}", stem, stamp, ext),
            None => format!("{}_ERROR_{}", stem, stamp),
        };

        let copy = match create_exclusive(&self.directory, &filename, &content) {
            Ok(copy) => copy,
            Err(e) => {
                log::warn!("No debug copy for {}: {}", source.display(), e);
                return;
            }
        };

        let mut sidecar = copy.clone().into_os_string();
        sidecar.push(".reason.txt");
        if let Err(e) = std::fs::write(&sidecar, format!("{}\n", reason)) {
            log::warn!("Failed to write {}: {}", PathBuf::from(sidecar).display(), e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn append(path: &Path, text: &str) -> Result<(), StorageError> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
    file.write_all(text.as_bytes())
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
}
