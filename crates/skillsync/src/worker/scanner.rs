use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glob::Pattern;
use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use walkdir::WalkDir;

use crate::error::WorkerError;
use crate::fingerprint::{modified_secs, FingerprintStore};
use crate::reconciler::{Dispatcher, ImportOutcome};
use crate::sanitize::redact_path;
use crate::storage::QuarantineReport;

/// Totals for one pass over the staging directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub archived: usize,
    pub quarantined: usize,
    /// Already archived and unchanged since.
    pub skipped: usize,
    /// The pass's quarantine report, if anything was quarantined.
    pub quarantine_report: Option<PathBuf>,
}

/// Sweeps the staging directory and feeds every structured file through the
/// same reconciliation path as the per-employee flow.
///
/// Archived files are remembered by modification time and skipped until they
/// change. Quarantined files are retried on every pass.
pub struct StagingScanner {
    staging_directory: PathBuf,
    quarantine_directory: PathBuf,
    pattern: Pattern,
    debug_copies: bool,
    dispatcher: Dispatcher,
    ledger: FingerprintStore,
}

impl StagingScanner {
    pub fn new(
        staging_directory: impl Into<PathBuf>,
        quarantine_directory: impl Into<PathBuf>,
        ledger_path: impl Into<PathBuf>,
        dispatcher: Dispatcher,
    ) -> Result<Self, WorkerError> {
        Ok(Self {
            staging_directory: staging_directory.into(),
            quarantine_directory: quarantine_directory.into(),
            pattern: compile_pattern("*.json")?,
            debug_copies: false,
            dispatcher,
            ledger: FingerprintStore::load(ledger_path)?,
        })
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, WorkerError> {
        self.pattern = compile_pattern(pattern)?;
        Ok(self)
    }

    pub fn with_debug_copies(mut self, debug_copies: bool) -> Self {
        self.debug_copies = debug_copies;
        self
    }

    pub fn staging_directory(&self) -> &Path {
        &self.staging_directory
    }

    /// Runs one pass. A file that fails to import never aborts the pass.
    pub fn scan(&mut self) -> Result<BulkReport, WorkerError> {
        let _span = tracing::info_span!(
            "scan.staging",
            dir = %redact_path(&self.staging_directory)
        )
        .entered();

        let mut bulk = BulkReport::default();
        if !self.staging_directory.is_dir() {
            debug!(
                "Staging directory {} does not exist yet",
                self.staging_directory.display()
            );
            return Ok(bulk);
        }

        let report = QuarantineReport::new(&self.quarantine_directory, self.debug_copies);

        for entry in WalkDir::new(&self.staging_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable staging entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.pattern.matches(&name) {
                continue;
            }

            let path = entry.path();
            let modified = match modified_secs(path) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Skipping {}: {}", redact_path(path), e);
                    continue;
                }
            };

            if self.ledger.is_current(&name, modified) {
                bulk.skipped += 1;
                continue;
            }

            match self.dispatcher.import_file(path, &report) {
                ImportOutcome::Archived { .. } => {
                    bulk.archived += 1;
                    self.ledger.record(name, modified);
                }
                ImportOutcome::Quarantined { reason } => {
                    debug!("Quarantined {}: {}", redact_path(path), reason);
                    bulk.quarantined += 1;
                    self.ledger.forget(&name);
                }
            }
        }

        if bulk.archived > 0 {
            self.ledger.save()?;
        }
        bulk.quarantine_report = report.report_path();

        info!(
            "Staging pass: {} archived, {} quarantined, {} unchanged",
            bulk.archived, bulk.quarantined, bulk.skipped
        );
        Ok(bulk)
    }

    /// Scans once, then again whenever a matching file in the staging
    /// directory changes, until `shutdown` is set.
    pub fn watch<F>(
        &mut self,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
        mut on_pass: F,
    ) -> Result<(), WorkerError>
    where
        F: FnMut(&BulkReport),
    {
        let initial = self.scan()?;
        on_pass(&initial);

        crate::storage::ensure_directory(&self.staging_directory)?;

        // PollWatcher works on network and container mounts
        let poll_config = NotifyConfig::default().with_poll_interval(poll_interval);
        let debouncer_config = DebouncerConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&self.staging_directory, RecursiveMode::NonRecursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching staging directory: {}", self.staging_directory.display());

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Watch mode shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    let relevant = events.iter().any(|event| {
                        matches!(event.kind, DebouncedEventKind::Any)
                            && event.path.is_file()
                            && event
                                .path
                                .file_name()
                                .map(|n| self.pattern.matches(&n.to_string_lossy()))
                                .unwrap_or(false)
                    });
                    if relevant {
                        match self.scan() {
                            Ok(bulk) => on_pass(&bulk),
                            Err(e) => error!("Staging pass failed: {}", e),
                        }
                    }
                }
                Ok(Err(errors)) => {
                    warn!("Watch error: {:?}", errors);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn compile_pattern(pattern: &str) -> Result<Pattern, WorkerError> {
    Pattern::new(pattern).map_err(|e| WorkerError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })
}
