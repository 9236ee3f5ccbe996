use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// "This employee's document set changed."
///
/// Carries only identifiers, never a handle into the request that produced
/// it, so it can outlive that request. Delivery may repeat; redundant
/// requests are cheap because unchanged documents are detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub employee_id: i64,
    pub business_id: String,
}

impl EnrichmentRequest {
    pub fn new(employee_id: i64, business_id: impl Into<String>) -> Self {
        Self {
            employee_id,
            business_id: business_id.into(),
        }
    }
}

/// A request accepted by the worker pool.
#[derive(Debug, Clone)]
pub struct EnrichmentJob {
    pub id: String,
    pub request: EnrichmentRequest,
    pub submitted_at: DateTime<Utc>,
}

impl EnrichmentJob {
    pub fn new(request: EnrichmentRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request,
            submitted_at: Utc::now(),
        }
    }
}
