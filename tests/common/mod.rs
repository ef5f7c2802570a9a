//! Shared fixtures: the bundled book graph and a scripted generator.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kg_agent::agent::llm::{LlmError, LlmResult, OutputContract, TextGenerator};
use kg_agent::graph::{GraphSource, GraphStore, Prefixes};

pub const NS: &str = "http://example.org/ontology/";

/// Triples in `demos/books/ontology.ttl`.
pub const ONTOLOGY_TRIPLES: usize = 33;
/// Triples in `demos/books/data.ttl`.
pub const DATA_TRIPLES: usize = 35;

pub fn demo_path(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos/books")
        .join(file)
}

pub fn book_store() -> GraphStore {
    GraphStore::load(
        &GraphSource::file(demo_path("ontology.ttl")),
        Some(&GraphSource::file(demo_path("data.ttl"))),
        Prefixes::standard(NS),
    )
    .unwrap()
}

pub fn ontology_only_store() -> GraphStore {
    GraphStore::load(
        &GraphSource::file(demo_path("ontology.ttl")),
        None,
        Prefixes::standard(NS),
    )
    .unwrap()
}

/// Replays canned replies in order and records every prompt it receives.
///
/// Once the script runs out, every call fails with an empty response.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<LlmResult<String>>>,
    prompts: Mutex<Vec<String>>,
    constrained: Mutex<Vec<bool>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful reply.
    pub fn reply(self: &Arc<Self>, text: impl Into<String>) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        Arc::clone(self)
    }

    /// Queue a failure.
    pub fn fail(self: &Arc<Self>, err: LlmError) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(Err(err));
        Arc::clone(self)
    }

    /// Queue a translation reply `{"sparql_query": query}`.
    pub fn query(self: &Arc<Self>, sparql: &str) -> Arc<Self> {
        self.reply(serde_json::json!({ "sparql_query": sparql }).to_string())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Whether each call carried an output contract, in call order.
    pub fn constrained(&self) -> Vec<bool> {
        self.constrained.lock().unwrap().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.constrained.lock().unwrap().push(contract.is_some());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse {
                reason: Some("script exhausted".into()),
            }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sleeps before every reply; used to exercise deadlines.
pub struct SlowGenerator {
    pub delay: Duration,
    pub reply: String,
}

impl TextGenerator for SlowGenerator {
    fn generate(&self, _prompt: &str, _contract: Option<&OutputContract>) -> LlmResult<String> {
        std::thread::sleep(self.delay);
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "slow"
    }
}
