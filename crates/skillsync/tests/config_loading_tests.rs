//! Table-driven tests for configuration loading and validation.

use assert_fs::prelude::*;
use assert_fs::TempDir;

use skillsync::config::{load_config, load_config_from_str, ConfigFormat};
use skillsync::reconciler::AssociationMode;
use skillsync::PipelineConfig;

/// Represents a single config loading test case.
struct ConfigTestCase {
    name: &'static str,
    content: &'static str,
    format: ConfigFormat,
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        content: r#"{ "version": "1.0" }"#,
        format: ConfigFormat::Json,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        content: r#"{
            "version": "1.0",
            "database_path": "/var/lib/skillsync/hr.db",
            "directories": {
                "employees": "/data/employees",
                "converted": "/data/converted",
                "staging": "/data/staging",
                "processed": "/data/processed"
            },
            "workers": { "count": 2, "queue_capacity": 10 },
            "extraction": {
                "endpoint": "http://localhost:8080/v1/chat/completions",
                "model": "local-model",
                "api_key_file": "/run/secrets/hr_key",
                "timeout_secs": 60,
                "max_retries": 3,
                "min_corpus_chars": 100
            },
            "reconciliation": { "update_existing": true },
            "quarantine": { "debug_copies": true },
            "scanner": { "pattern": "*.json", "poll_interval_secs": 2 }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_yaml",
        content: "version: \"1.0\"\ndirectories:\n  staging: inbox\nworkers:\n  count: 1\n",
        format: ConfigFormat::Yaml,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        content: r#"{ "workers": { "count": 1 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        content: r#"{ "version": "2.0" }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_field",
        content: r#"{ "version": "1.0", "input_directory": "/input" }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "zero_workers",
        content: r#"{ "version": "1.0", "workers": { "count": 0 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "too_many_retries",
        content: r#"{ "version": "1.0", "extraction": { "max_retries": 7 } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "yaml_schema_error",
        content: "version: \"1.0\"\nquarantine:\n  debug_copies: maybe\n",
        format: ConfigFormat::Yaml,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "staging_equals_processed",
        content: r#"{
            "version": "1.0",
            "directories": { "staging": "/data/json", "processed": "/data/json" }
        }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Config validation failed"),
    },
    ConfigTestCase {
        name: "blank_directory",
        content: r#"{ "version": "1.0", "directories": { "employees": "   " } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("directories.employees must not be empty"),
    },
    ConfigTestCase {
        name: "invalid_scanner_pattern",
        content: r#"{ "version": "1.0", "scanner": { "pattern": "[" } }"#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Invalid scanner pattern"),
    },
    ConfigTestCase {
        name: "malformed_json",
        content: r#"{ "version": "1.0", "#,
        format: ConfigFormat::Json,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "malformed_yaml",
        content: "version: [1.0\n",
        format: ConfigFormat::Yaml,
        should_succeed: false,
        expected_error: Some("Failed to parse config YAML"),
    },
];

#[test]
fn test_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.content, test_case.format);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_defaults_applied() {
    let config = load_config_from_str(r#"{ "version": "1.0" }"#, ConfigFormat::Json).unwrap();

    assert!(config.database_path.is_none());
    assert_eq!(config.directories.employees, "employee_documents");
    assert_eq!(config.directories.staging, "converted/json_files");
    assert_eq!(config.directories.processed, "converted/json_processed");
    assert!(config.workers.count >= 1);
    assert_eq!(config.workers.queue_capacity, 64);
    assert_eq!(config.extraction.min_corpus_chars, 50);
    assert!(!config.reconciliation.update_existing);
    assert!(!config.quarantine.debug_copies);
    assert_eq!(config.scanner.pattern, "*.json");
}

#[test]
fn test_load_from_file_picks_format_by_extension() {
    let temp = TempDir::new().unwrap();
    let yaml = temp.child("skillsync.yml");
    yaml.write_str(
        "version: \"1.0\"\nreconciliation:\n  update_existing: true\nquarantine:\n  debug_copies: true\n",
    )
    .unwrap();

    let config = load_config(yaml.path()).unwrap();
    let pipeline = PipelineConfig::from_config(&config);

    assert_eq!(pipeline.association_mode, AssociationMode::UpdateInPlace);
    assert!(pipeline.debug_copies);
    assert_eq!(
        pipeline.quarantine_directory(),
        std::path::Path::new("converted/json_processed/quarantine")
    );
}

#[test]
fn test_missing_file_names_the_path() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("absent.json");

    let err = load_config(&missing).unwrap_err().to_string();

    assert!(err.contains("Failed to read config file"));
    assert!(err.contains("absent.json"));
}
