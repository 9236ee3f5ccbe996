use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite database file. Falls back to the platform data directory.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            directories: DirectoriesConfig::default(),
            workers: WorkersConfig::default(),
            extraction: ExtractionConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            quarantine: QuarantineConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

/// Directory roles used by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    /// Root holding one `<business_id>/documents` folder per employee.
    #[serde(default = "default_employees_dir")]
    pub employees: String,
    /// Aggregated plain-text corpora, one per employee.
    #[serde(default = "default_converted_dir")]
    pub converted: String,
    /// Extraction-ready structured files awaiting reconciliation.
    #[serde(default = "default_staging_dir")]
    pub staging: String,
    /// Archive of successfully reconciled files. Quarantine lives below it.
    #[serde(default = "default_processed_dir")]
    pub processed: String,
}

fn default_employees_dir() -> String {
    "employee_documents".to_string()
}

fn default_converted_dir() -> String {
    "converted".to_string()
}

fn default_staging_dir() -> String {
    "converted/json_files".to_string()
}

fn default_processed_dir() -> String {
    "converted/json_processed".to_string()
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            employees: default_employees_dir(),
            converted: default_converted_dir(),
            staging: default_staging_dir(),
            processed: default_processed_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Maximum number of queued enrichment tasks before new ones are rejected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after the first attempt, transient failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Corpora shorter than this are not sent to the service.
    #[serde(default = "default_min_corpus_chars")]
    pub min_corpus_chars: usize,
}

fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("SKILLSYNC_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

fn default_min_corpus_chars() -> usize {
    50
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            min_corpus_chars: default_min_corpus_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Refresh level/certification of associations that already exist.
    #[serde(default)]
    pub update_existing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarantineConfig {
    /// Write an annotated copy of each quarantined file next to the report.
    #[serde(default)]
    pub debug_copies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Glob matched against file names in the staging directory.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_pattern() -> String {
    "*.json".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::Text),
            _ => None,
        }
    }

    /// Maps a declared MIME type onto a supported format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" | "text/markdown" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "txt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("Docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Text));
    }

    #[test]
    fn test_from_extension_unsupported() {
        assert_eq!(DocumentFormat::from_extension("doc"), None);
        assert_eq!(DocumentFormat::from_extension("png"), None);
        assert_eq!(DocumentFormat::from_extension(""), None);
    }

    #[test]
    fn test_from_mime() {
        assert_eq!(
            DocumentFormat::from_mime("application/pdf"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_mime("text/plain; charset=utf-8"),
            Some(DocumentFormat::Text)
        );
        assert_eq!(
            DocumentFormat::from_mime(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::from_mime("image/png"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.directories.staging, "converted/json_files");
        assert_eq!(config.workers.queue_capacity, 64);
        assert!(config.workers.count >= 1);
        assert_eq!(config.extraction.timeout_secs, 30);
        assert_eq!(config.extraction.max_retries, 1);
        assert_eq!(config.scanner.pattern, "*.json");
        assert!(!config.reconciliation.update_existing);
        assert!(!config.quarantine.debug_copies);
    }
}
