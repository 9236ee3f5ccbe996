use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from the file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.workers.count == 0 {
        return Err(ConfigError::Validation {
            message: "workers.count must be at least 1".to_string(),
        });
    }

    if config.workers.queue_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "workers.queue_capacity must be at least 1".to_string(),
        });
    }

    let dirs = &config.directories;
    for (role, value) in [
        ("employees", &dirs.employees),
        ("converted", &dirs.converted),
        ("staging", &dirs.staging),
        ("processed", &dirs.processed),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("directories.{} must not be empty", role),
            });
        }
    }

    if dirs.staging == dirs.processed {
        return Err(ConfigError::Validation {
            message: "directories.staging and directories.processed must differ".to_string(),
        });
    }

    if config.extraction.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.extraction.max_retries > 3 {
        return Err(ConfigError::Validation {
            message: format!(
                "extraction.max_retries must be at most 3, got {}",
                config.extraction.max_retries
            ),
        });
    }

    if let Err(e) = glob::Pattern::new(&config.scanner.pattern) {
        return Err(ConfigError::InvalidPattern {
            pattern: config.scanner.pattern.clone(),
            reason: e.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/skillsync/hr.db",
            "directories": {
                "employees": "/data/employees",
                "staging": "/data/staging",
                "processed": "/data/processed"
            },
            "workers": { "count": 4, "queue_capacity": 16 },
            "extraction": { "timeout_secs": 20, "api_key_env": "HR_KEY" }
        }
        "#;

        let config = load_config_from_str(config_json, ConfigFormat::Json).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.database_path.as_deref(), Some("/var/lib/skillsync/hr.db"));
        assert_eq!(config.directories.employees, "/data/employees");
        assert_eq!(config.directories.converted, "converted");
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.workers.queue_capacity, 16);
        assert_eq!(config.extraction.timeout_secs, 20);
        assert_eq!(config.extraction.api_key_env.as_deref(), Some("HR_KEY"));
    }

    #[test]
    fn test_load_yaml_config() {
        let config_yaml = r#"
version: "1.0"
directories:
  staging: incoming/json
quarantine:
  debug_copies: true
scanner:
  pattern: "*.json"
"#;

        let config = load_config_from_str(config_yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.directories.staging, "incoming/json");
        assert!(config.quarantine.debug_copies);
    }

    #[test]
    fn test_unknown_field_fails_schema() {
        let config_json = r#"{ "version": "1.0", "input_directory": "/input" }"#;
        let result = load_config_from_str(config_json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unsupported_version_fails() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_zero_workers_fails() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "workers": { "count": 0 } }"#,
            ConfigFormat::Json,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_too_many_retries_fails() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "extraction": { "max_retries": 5 } }"#,
            ConfigFormat::Json,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_same_staging_and_processed_fails() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "directories": { "staging": "x", "processed": "x" } }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_invalid_glob_pattern_fails() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "scanner": { "pattern": "[abc" } }"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_invalid_json_fails() {
        let result = load_config_from_str("{ not json", ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/skillsync.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
