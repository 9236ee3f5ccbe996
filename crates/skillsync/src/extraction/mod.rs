//! Structured skill extraction.
//!
//! The extraction service is an opaque `text -> JSON` function whose output
//! cannot be trusted. [`normalize_result`] turns whatever came back
//! (including a failure) into a document that always has a `skills` array
//! and the employee's `business_id`, so nothing downstream crashes on a
//! missing field.

pub mod http;
pub mod parse;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::sanitize::excerpt;
use crate::secrets::SecretError;

pub use http::HttpExtractionClient;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction service unreachable: {0}")]
    Connect(String),

    #[error("Extraction request failed: {0}")]
    Transport(String),

    #[error("Extraction request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Extraction service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Extraction response is not valid JSON: {0}")]
    Unparsable(String),

    #[error("Extraction service returned an empty response")]
    EmptyResponse,

    #[error("Corpus too short for extraction ({chars} chars, need {min})")]
    InsufficientText { chars: usize, min: usize },

    #[error("API key unavailable: {0}")]
    Credentials(#[from] SecretError),
}

impl ExtractionError {
    /// Failures worth one more attempt: timeouts, refused connections,
    /// rate limiting and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractionError::Connect(_) | ExtractionError::Timeout { .. } => true,
            ExtractionError::Status { code, .. } => *code == 429 || (500..=599).contains(code),
            _ => false,
        }
    }
}

/// Turns free text into a structured skill document.
///
/// Implementations block; they run on worker threads.
pub trait ExtractionClient: Send + Sync {
    fn extract(&self, corpus: &str) -> Result<Value, ExtractionError>;
}

/// Calls `client` unless the corpus has fewer than `min_chars` characters of
/// real content, in which case the service is not contacted at all.
pub fn extract_corpus(
    client: &dyn ExtractionClient,
    corpus: &str,
    content_chars: usize,
    min_chars: usize,
) -> Result<Value, ExtractionError> {
    if content_chars < min_chars {
        return Err(ExtractionError::InsufficientText {
            chars: content_chars,
            min: min_chars,
        });
    }
    client.extract(corpus)
}

/// A document ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub document: Value,
    /// Set when the service output was unusable and an empty document was
    /// substituted.
    pub degraded: Option<String>,
}

/// The minimal valid document: no skills, just the owner.
pub fn empty_document(business_id: &str) -> Value {
    json!({ "skills": [], "business_id": business_id })
}

/// Coerces an extraction outcome into `{skills: [...], business_id, ..}`.
///
/// The business id is always the requesting employee's; a different id
/// reported by the service is overwritten.
pub fn normalize_result(
    outcome: Result<Value, ExtractionError>,
    business_id: &str,
) -> NormalizedResult {
    let mut object: Map<String, Value> = match outcome {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            let reason = format!("response is not an object: {}", excerpt(&other.to_string(), 80));
            log::warn!("Degrading extraction for {}: {}", business_id, reason);
            return degraded(business_id, reason);
        }
        Err(e) => {
            log::warn!("Degrading extraction for {}: {}", business_id, e);
            return degraded(business_id, e.to_string());
        }
    };

    let mut note = None;
    match object.get("skills") {
        Some(Value::Array(_)) => {}
        Some(other) => {
            let reason = format!("`skills` is not a list: {}", excerpt(&other.to_string(), 80));
            log::warn!("Degrading extraction for {}: {}", business_id, reason);
            object.insert("skills".to_string(), Value::Array(Vec::new()));
            note = Some(reason);
        }
        None => {
            log::warn!("Extraction for {} has no `skills` key, assuming none", business_id);
            object.insert("skills".to_string(), Value::Array(Vec::new()));
        }
    }

    match object.get("business_id").and_then(Value::as_str) {
        Some(reported) if reported.trim() == business_id => {}
        Some(reported) if !reported.trim().is_empty() => {
            log::warn!(
                "Extraction reported business id {} for {}, keeping {}",
                reported,
                business_id,
                business_id
            );
        }
        _ => {}
    }
    object.insert("business_id".to_string(), Value::String(business_id.to_string()));

    NormalizedResult {
        document: Value::Object(object),
        degraded: note,
    }
}

fn degraded(business_id: &str, reason: String) -> NormalizedResult {
    NormalizedResult {
        document: empty_document(business_id),
        degraded: Some(reason),
    }
}
