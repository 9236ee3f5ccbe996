pub mod job;
pub mod pool;
pub mod scanner;

pub use job::{EnrichmentJob, EnrichmentRequest};
pub use pool::{EnrichmentPool, EnrichmentRunner, Submission, WorkerState};
pub use scanner::{BulkReport, StagingScanner};
