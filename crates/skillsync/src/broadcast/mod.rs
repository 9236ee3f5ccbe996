//! Event streaming for enrichment progress.
//!
//! Events go out on a `tokio::sync::broadcast` channel so any number of
//! observers (the CLI, tests, an embedding service) can follow jobs without
//! the worker pool knowing about them.

pub mod enrichment;

pub use enrichment::{EnrichmentBroadcaster, EnrichmentEvent, EnrichmentPhase, EnrichmentTracker};
