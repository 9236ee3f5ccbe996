//! Turns employee documents into structured skill records.
//!
//! Uploaded documents are converted to text and aggregated per employee,
//! sent to an extraction service, and the structured answer is reconciled
//! into the skills database. Externally produced skill files can be dropped
//! into a staging directory and go through the same reconciliation.

pub mod aggregator;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod fingerprint;
pub mod intake;
pub mod pipeline;
pub mod processor;
pub mod reconciler;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use broadcast::{EnrichmentBroadcaster, EnrichmentEvent, EnrichmentPhase};
pub use config::{load_config, Config, DocumentFormat};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, ProcessError, Result, SkillsyncError, StorageError, WorkerError,
};
pub use extraction::{ExtractionClient, ExtractionError, HttpExtractionClient};
pub use intake::{AcceptedDocument, DocumentIntake, IntakeError};
pub use pipeline::{EnrichmentOutcome, EnrichmentPipeline, PipelineConfig, PipelineError};
pub use reconciler::{Dispatcher, ImportError, ImportOutcome, ImportSummary, ValidationError};
pub use secrets::{SecretError, SecretSource};
pub use worker::{EnrichmentPool, EnrichmentRequest, StagingScanner};
