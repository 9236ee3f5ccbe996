//! Scripted stand-in for the extraction service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use skillsync::extraction::{ExtractionClient, ExtractionError};

/// Replays queued answers in order; once the script runs out every call
/// returns an empty skill list.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<Value, ExtractionError>>>,
    corpora: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            corpora: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn then_answer(&self, answer: Value) -> &Self {
        self.script.lock().unwrap().push_back(Ok(answer));
        self
    }

    pub fn then_fail(&self, error: ExtractionError) -> &Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every corpus the client was asked about, in call order.
    pub fn corpora(&self) -> Vec<String> {
        self.corpora.lock().unwrap().clone()
    }
}

impl ExtractionClient for ScriptedClient {
    fn extract(&self, corpus: &str) -> Result<Value, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.corpora.lock().unwrap().push(corpus.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "skills": [] })))
    }
}
