//! Shared test utilities for skillsync integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs over a temporary directory tree
//! - Builders for skill documents and employee profiles
//! - `ScriptedClient`, an extraction client that replays canned answers

pub mod builders;
pub mod harness;
pub mod mock;

pub use builders::*;
pub use harness::TestHarness;
pub use mock::ScriptedClient;
