//! Enrichment progress broadcaster for status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::worker::job::EnrichmentRequest;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentPhase {
    Queued,
    Started,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for EnrichmentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentPhase::Queued => write!(f, "Queued"),
            EnrichmentPhase::Started => write!(f, "Started"),
            EnrichmentPhase::Completed => write!(f, "Completed"),
            EnrichmentPhase::Failed => write!(f, "Failed"),
            EnrichmentPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Progress event for one enrichment job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentEvent {
    pub job_id: String,
    pub employee_id: i64,
    pub business_id: String,
    pub phase: EnrichmentPhase,
    /// Human-readable description of the phase.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichmentEvent {
    pub fn new(
        job_id: &str,
        request: &EnrichmentRequest,
        phase: EnrichmentPhase,
        message: &str,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            employee_id: request.employee_id,
            business_id: request.business_id.clone(),
            phase,
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(job_id: &str, request: &EnrichmentRequest, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, request, EnrichmentPhase::Failed, "Enrichment failed")
        }
    }
}

#[derive(Clone)]
pub struct EnrichmentBroadcaster {
    sender: Arc<broadcast::Sender<EnrichmentEvent>>,
}

impl EnrichmentBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: EnrichmentEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnrichmentEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for a job and announces it as queued.
    pub fn track(&self, job_id: &str, request: &EnrichmentRequest) -> EnrichmentTracker {
        let tracker = EnrichmentTracker {
            job_id: job_id.to_string(),
            request: request.clone(),
            sender: Arc::clone(&self.sender),
        };
        tracker.phase(EnrichmentPhase::Queued, "Enrichment queued");
        tracker
    }
}

impl Default for EnrichmentBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Sends the events of a single job.
pub struct EnrichmentTracker {
    job_id: String,
    request: EnrichmentRequest,
    sender: Arc<broadcast::Sender<EnrichmentEvent>>,
}

impl EnrichmentTracker {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn phase(&self, phase: EnrichmentPhase, message: &str) {
        let _ = self
            .sender
            .send(EnrichmentEvent::new(&self.job_id, &self.request, phase, message));
    }

    pub fn failed(&self, error: &str) {
        let _ = self
            .sender
            .send(EnrichmentEvent::failed(&self.job_id, &self.request, error));
    }
}
