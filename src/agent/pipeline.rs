//! The question-answering pipeline.
//!
//! translate → execute → (augment → execute) → synthesize
//!
//! Every stage failure is recovered here and turned into a user-facing
//! message; [`KgAgent::answer`] never returns an error. At most one
//! augmentation is attempted per request, so the query runs at most twice.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::augment::Augmenter;
use super::execute::{Executor, ResultSet};
use super::llm::TextGenerator;
use super::prompts::{default_examples, FewShotExample};
use super::synthesize::Synthesizer;
use super::translate::{StructuredQuery, Translator};
use crate::config::AgentConfig;
use crate::error::GraphResult;
use crate::graph::schema::SchemaDescription;
use crate::graph::{GraphStore, SnapshotWriter};
use crate::paths::AgentPaths;

/// Answer when the translator produced nothing usable.
pub const NOT_UNDERSTOOD: &str =
    "I couldn't understand your request to form a query. Please try rephrasing.";

/// Answer when the translator explicitly declined.
pub const NO_QUERY: &str =
    "I couldn't formulate a relevant query based on your request. Please try rephrasing.";

// ── Options ─────────────────────────────────────────────────────────────

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub examples: Vec<FewShotExample>,
    pub augmentation_enabled: bool,
    pub scope_relation_prefix: String,
    /// Where to checkpoint the store after a merge; `None` disables snapshots.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            examples: default_examples(),
            augmentation_enabled: true,
            scope_relation_prefix: "hasRecommended".into(),
            snapshot_dir: None,
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &AgentConfig, paths: Option<&AgentPaths>) -> Self {
        Self {
            examples: config.examples.clone(),
            augmentation_enabled: config.augmentation.enabled,
            scope_relation_prefix: config.augmentation.scope_relation_prefix.clone(),
            snapshot_dir: config.snapshot_dir(paths),
        }
    }
}

// ── Response ────────────────────────────────────────────────────────────

/// Outcome of one request, serialized as the HTTP response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub user_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_query_results: Option<ResultSet>,
    pub agent_response: String,
    /// Generated payload; present only when augmentation was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_facts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub augmentation_applied: Option<bool>,
    /// Execution error text, when the query could not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_error: Option<String>,
}

impl AgentResponse {
    fn message(question: &str, text: &str) -> Self {
        Self {
            user_prompt: question.to_string(),
            sparql_query: None,
            raw_query_results: None,
            agent_response: text.to_string(),
            generated_facts: None,
            augmentation_applied: None,
            query_error: None,
        }
    }
}

// ── Stats ───────────────────────────────────────────────────────────────

/// Process-lifetime counters.
#[derive(Debug, Default)]
pub struct AgentStats {
    requests: AtomicU64,
    translation_failures: AtomicU64,
    executions: AtomicU64,
    augmentations_attempted: AtomicU64,
    augmentations_applied: AtomicU64,
    augmentations_rejected: AtomicU64,
    triples_added: AtomicU64,
}

/// Point-in-time copy of [`AgentStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub translation_failures: u64,
    pub executions: u64,
    pub augmentations_attempted: u64,
    pub augmentations_applied: u64,
    pub augmentations_rejected: u64,
    pub triples_added: u64,
}

impl AgentStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            translation_failures: self.translation_failures.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            augmentations_attempted: self.augmentations_attempted.load(Ordering::Relaxed),
            augmentations_applied: self.augmentations_applied.load(Ordering::Relaxed),
            augmentations_rejected: self.augmentations_rejected.load(Ordering::Relaxed),
            triples_added: self.triples_added.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Agent ───────────────────────────────────────────────────────────────

/// The knowledge graph question-answering agent.
pub struct KgAgent {
    store: Arc<GraphStore>,
    schema: SchemaDescription,
    translator: Translator,
    executor: Executor,
    augmenter: Augmenter,
    synthesizer: Synthesizer,
    augmentation_enabled: bool,
    stats: AgentStats,
}

impl KgAgent {
    /// Build the agent. A snapshot directory that cannot be created disables
    /// snapshots with a warning rather than failing.
    pub fn new(
        store: Arc<GraphStore>,
        generator: Arc<dyn TextGenerator>,
        options: AgentOptions,
    ) -> Self {
        let mut augmenter = Augmenter::new(Arc::clone(&generator), options.scope_relation_prefix);
        if let Some(dir) = options.snapshot_dir {
            match SnapshotWriter::new(&dir) {
                Ok(writer) => augmenter = augmenter.with_snapshots(writer),
                Err(e) => tracing::warn!(error = %e, "snapshots disabled"),
            }
        }
        let schema = store.schema().describe(store.prefixes());

        Self {
            store,
            schema,
            translator: Translator::new(Arc::clone(&generator), options.examples),
            executor: Executor::new(),
            augmenter,
            synthesizer: Synthesizer::new(generator),
            augmentation_enabled: options.augmentation_enabled,
            stats: AgentStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// The schema rendering used in prompts.
    pub fn schema_description(&self) -> &SchemaDescription {
        &self.schema
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Translate only, without executing.
    pub fn translate(&self, question: &str) -> Option<StructuredQuery> {
        self.translator.translate(question, &self.schema)
    }

    /// Answer one question.
    pub fn answer(&self, question: &str) -> AgentResponse {
        AgentStats::bump(&self.stats.requests);
        tracing::info!(question, "request received");

        let Some(query) = self.translate(question) else {
            AgentStats::bump(&self.stats.translation_failures);
            return AgentResponse::message(question, NOT_UNDERSTOOD);
        };
        if query.is_blank() {
            AgentStats::bump(&self.stats.translation_failures);
            return AgentResponse::message(question, NO_QUERY);
        }

        let mut response = AgentResponse::message(question, "");
        response.sparql_query = Some(query.text.clone());

        let results = match self.run(&query.text, &self.store) {
            Ok(results) if results.is_empty() && self.augmentation_enabled => self
                .augment_and_retry(question, &query, &mut response)
                .unwrap_or(results),
            Ok(results) => results,
            Err(e) => {
                // A query that cannot run will not be fixed by new facts.
                tracing::warn!(error = %e, "query execution failed");
                response.query_error = Some(e.to_string());
                ResultSet::default()
            }
        };

        response.agent_response = self.synthesizer.synthesize(question, &results);
        tracing::info!(
            rows = results.len(),
            augmented = ?response.augmentation_applied,
            "request answered"
        );
        response.raw_query_results = Some(results);
        response
    }

    fn run(&self, query: &str, store: &GraphStore) -> GraphResult<ResultSet> {
        AgentStats::bump(&self.stats.executions);
        self.executor.try_execute(query, store)
    }

    /// One augmentation attempt. Returns the re-queried results after a merge.
    ///
    /// Generation runs unlocked; validate, merge, snapshot and the re-query
    /// all happen under one write gate so the re-query sees exactly this
    /// request's merge.
    fn augment_and_retry(
        &self,
        question: &str,
        query: &StructuredQuery,
        response: &mut AgentResponse,
    ) -> Option<ResultSet> {
        AgentStats::bump(&self.stats.augmentations_attempted);
        response.augmentation_applied = Some(false);

        let Some(payload) = self.augmenter.draft(question, query, &self.store) else {
            AgentStats::bump(&self.stats.augmentations_rejected);
            return None;
        };

        let writer = self.store.writer();
        let outcome = self.augmenter.apply(&payload, &writer);
        response.generated_facts = outcome.facts_text;
        if !outcome.applied {
            AgentStats::bump(&self.stats.augmentations_rejected);
            return None;
        }
        response.augmentation_applied = Some(true);
        AgentStats::bump(&self.stats.augmentations_applied);
        self.stats
            .triples_added
            .fetch_add(outcome.triples_added as u64, Ordering::Relaxed);

        match self.run(&query.text, writer.graph()) {
            Ok(results) => Some(results),
            Err(e) => {
                tracing::warn!(error = %e, "re-query after augmentation failed");
                response.query_error = Some(e.to_string());
                None
            }
        }
    }
}

impl std::fmt::Debug for KgAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KgAgent")
            .field("store", &self.store)
            .field("augmentation_enabled", &self.augmentation_enabled)
            .field("snapshots", &self.augmenter.snapshots().map(SnapshotWriter::dir))
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_omits_optional_keys() {
        let json = serde_json::to_value(AgentResponse::message("hi", NOT_UNDERSTOOD)).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"user_prompt"));
        assert!(keys.contains(&"agent_response"));
    }

    #[test]
    fn stats_snapshot_reads_counters() {
        let stats = AgentStats::default();
        AgentStats::bump(&stats.requests);
        AgentStats::bump(&stats.requests);
        AgentStats::bump(&stats.executions);
        let snap = stats.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.executions, 1);
        assert_eq!(snap.augmentations_attempted, 0);
    }

    #[test]
    fn options_follow_config() {
        let mut config = AgentConfig::default();
        config.augmentation.enabled = false;
        config.graph.snapshot_dir = Some(PathBuf::from("/tmp/kg-snaps"));
        let options = AgentOptions::from_config(&config, None);
        assert!(!options.augmentation_enabled);
        assert_eq!(options.snapshot_dir, Some(PathBuf::from("/tmp/kg-snaps")));
        assert_eq!(options.examples.len(), 6);
    }
}
