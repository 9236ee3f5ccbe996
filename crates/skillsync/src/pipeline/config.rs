use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::reconciler::AssociationMode;

/// Resolved directory layout and knobs shared by the pipeline, importer and
/// scanner.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub employees_directory: PathBuf,
    pub converted_directory: PathBuf,
    pub staging_directory: PathBuf,
    pub processed_directory: PathBuf,
    pub min_corpus_chars: usize,
    pub association_mode: AssociationMode,
    pub debug_copies: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            employees_directory: PathBuf::from(&config.directories.employees),
            converted_directory: PathBuf::from(&config.directories.converted),
            staging_directory: PathBuf::from(&config.directories.staging),
            processed_directory: PathBuf::from(&config.directories.processed),
            min_corpus_chars: config.extraction.min_corpus_chars,
            association_mode: AssociationMode::from_update_existing(
                config.reconciliation.update_existing,
            ),
            debug_copies: config.quarantine.debug_copies,
        }
    }

    /// Lays every directory out below `root` with the default names.
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Config::default();
        let mut config = Self::from_config(&defaults);
        config.employees_directory = root.join(&config.employees_directory);
        config.converted_directory = root.join(&config.converted_directory);
        config.staging_directory = root.join(&config.staging_directory);
        config.processed_directory = root.join(&config.processed_directory);
        config
    }

    pub fn documents_directory(&self, business_id: &str) -> PathBuf {
        self.employees_directory.join(business_id).join("documents")
    }

    pub fn fingerprint_path(&self, business_id: &str) -> PathBuf {
        self.employees_directory.join(business_id).join("meta.json")
    }

    pub fn aggregate_path(&self, business_id: &str) -> PathBuf {
        self.converted_directory
            .join(format!("{}_documents.txt", business_id))
    }

    pub fn staging_path(&self, business_id: &str) -> PathBuf {
        self.staging_directory.join(format!("{}.json", business_id))
    }

    pub fn quarantine_directory(&self) -> PathBuf {
        self.processed_directory.join("quarantine")
    }

    /// Record of staging files the bulk scanner has already archived.
    pub fn staging_ledger_path(&self) -> PathBuf {
        self.processed_directory.join("staging_meta.json")
    }
}
