//! Self-healing augmentation for queries that return nothing.
//!
//! The generator drafts Turtle facts about the question's scope. The draft is
//! parsed in isolation and every triple is checked against the schema before
//! anything touches the store. A rejected draft is returned annotated with the
//! reason and never merged. The augmenter does not re-query; the caller runs
//! the query once more after a successful merge.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use super::llm::{strip_code_fence, TextGenerator};
use super::prompts::augmentation_prompt;
use super::translate::StructuredQuery;
use crate::error::GraphError;
use crate::graph::parse::parse_triples;
use crate::graph::{GraphFormat, GraphStore, SchemaViolation, SnapshotWriter, StoreWriter, Triple};

/// Why a generated batch was not merged.
#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("generated facts do not parse: {message}")]
    #[diagnostic(
        code(kg::augment::parse),
        help("The model's output was not valid Turtle.")
    )]
    Parse { message: String },

    #[error("generated facts contain no triples")]
    #[diagnostic(code(kg::augment::empty))]
    Empty,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaViolation),
}

impl ValidationError {
    fn annotation_label(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "Parse error",
            Self::Empty | Self::Schema(_) => "Rejected",
        }
    }
}

/// A parsed, schema-conformant batch ready to merge.
#[derive(Debug, Clone)]
pub struct FactBatch {
    /// The Turtle payload as the model wrote it.
    pub payload: String,
    pub triples: Vec<Triple>,
}

/// Result of one augmentation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AugmentOutcome {
    /// Whether the batch was merged.
    pub applied: bool,
    /// The payload, annotated with the failure reason when rejected.
    /// `None` when the generator produced nothing.
    pub facts_text: Option<String>,
    /// Triples that were new to the store.
    pub triples_added: usize,
    /// Snapshot written after the merge, if any.
    pub snapshot: Option<PathBuf>,
}

impl AugmentOutcome {
    fn rejected(facts_text: String) -> Self {
        Self {
            facts_text: Some(facts_text),
            ..Default::default()
        }
    }
}

/// Terms in a SPARQL query: IRIs, prefixed names, variables, literals, punctuation.
static RE_QUERY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<[^<>\s]*>|(?:[A-Za-z][\w\-.]*)?:[\w\-]*|[?$]\w+|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[{}.;,()]"#,
    )
    .unwrap()
});

/// Line openings of a Turtle statement or directive: `@prefix`, `PREFIX`,
/// an IRI, a blank node, a collection or a prefixed name.
static RE_STATEMENT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@prefix\s|@base\s|(?i:prefix|base)\s|<|_:|\[|\(|:|[A-Za-z][\w\-.]*:\S)").unwrap()
});

/// Cut model commentary from around the Turtle statements in `text`.
///
/// The window runs from the first line that opens a statement to the latest
/// line ending in `.` for which the window parses. `text` is returned as-is
/// when it already parses or when no window does.
pub fn isolate_turtle<'t>(text: &'t str, prelude: &str) -> &'t str {
    let parses = |candidate: &str| {
        parse_triples(&format!("{prelude}{candidate}\n"), GraphFormat::Turtle, "generated facts")
            .is_ok_and(|triples| !triples.is_empty())
    };
    if parses(text) {
        return text;
    }

    let mut offset = 0;
    let lines: Vec<(usize, &str)> = text
        .split_inclusive('\n')
        .map(|line| {
            let start = offset;
            offset += line.len();
            (start, line)
        })
        .collect();
    let Some(first) = lines
        .iter()
        .position(|(_, line)| RE_STATEMENT_START.is_match(line.trim_start()))
    else {
        return text;
    };

    for last in (first..lines.len()).rev() {
        let (start, line) = lines[last];
        if !line.trim_end().ends_with('.') {
            continue;
        }
        let candidate = text[lines[first].0..start + line.len()].trim();
        if parses(candidate) {
            tracing::debug!(dropped_lines = lines.len() - (last - first + 1), "commentary cut from generated facts");
            return candidate;
        }
    }
    text
}

/// Find the entity a query asks about: the subject immediately followed by a
/// relation whose local name starts with `relation_prefix`.
pub fn scope_from_query(query: &str, relation_prefix: &str) -> Option<String> {
    if relation_prefix.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = RE_QUERY_TOKEN.find_iter(query).map(|m| m.as_str()).collect();
    tokens.windows(2).find_map(|pair| {
        let (subject, relation) = (pair[0], pair[1]);
        let is_entity = local_name(subject).is_some_and(|l| !l.is_empty());
        let is_scope_relation =
            local_name(relation).is_some_and(|l| l.starts_with(relation_prefix));
        (is_entity && is_scope_relation).then(|| subject.to_string())
    })
}

fn local_name(token: &str) -> Option<&str> {
    if let Some(iri) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return iri.rsplit(['/', '#']).next();
    }
    if token.starts_with(['?', '$', '"', '\'']) {
        return None;
    }
    token.split_once(':').map(|(_, local)| local)
}

/// Scope hint: the translator's scope, else the query heuristic, else the question.
pub fn derive_scope(question: &str, query: &StructuredQuery, relation_prefix: &str) -> String {
    query
        .scope
        .clone()
        .or_else(|| scope_from_query(&query.text, relation_prefix))
        .unwrap_or_else(|| question.trim().to_string())
}

/// Drafts, validates and merges generated facts.
pub struct Augmenter {
    generator: Arc<dyn TextGenerator>,
    scope_relation_prefix: String,
    snapshots: Option<SnapshotWriter>,
}

impl Augmenter {
    pub fn new(generator: Arc<dyn TextGenerator>, scope_relation_prefix: impl Into<String>) -> Self {
        Self {
            generator,
            scope_relation_prefix: scope_relation_prefix.into(),
            snapshots: None,
        }
    }

    /// Write a snapshot after every successful merge.
    pub fn with_snapshots(mut self, writer: SnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    pub fn snapshots(&self) -> Option<&SnapshotWriter> {
        self.snapshots.as_ref()
    }

    /// Ask the generator for facts. `None` when the call failed.
    ///
    /// Runs without the write gate held.
    pub fn draft(&self, question: &str, query: &StructuredQuery, store: &GraphStore) -> Option<String> {
        let scope = derive_scope(question, query, &self.scope_relation_prefix);
        let schema = store.schema().describe(store.prefixes());
        let prompt = augmentation_prompt(
            question,
            &query.text,
            &scope,
            &schema,
            &store.prefixes().turtle_prelude(),
        );

        match self.generator.generate(&prompt, None) {
            Ok(raw) => {
                tracing::debug!(raw = %raw, scope = %scope, "augmentation output");
                let prelude = store.prefixes().turtle_prelude();
                Some(isolate_turtle(strip_code_fence(&raw), &prelude).to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, scope = %scope, "fact generation failed");
                None
            }
        }
    }

    /// Parse `payload` in isolation and check every triple against the schema.
    pub fn validate(&self, payload: &str, store: &GraphStore) -> Result<FactBatch, ValidationError> {
        let document = format!("{}{payload}\n", store.prefixes().turtle_prelude());
        let triples = parse_triples(&document, GraphFormat::Turtle, "generated facts").map_err(
            |e| match e {
                GraphError::Parse { message, .. } => ValidationError::Parse { message },
                other => ValidationError::Parse {
                    message: other.to_string(),
                },
            },
        )?;
        if triples.is_empty() {
            return Err(ValidationError::Empty);
        }
        let schema = store.schema();
        for triple in &triples {
            schema.check_triple(triple)?;
        }
        Ok(FactBatch {
            payload: payload.to_string(),
            triples,
        })
    }

    /// Validate and merge `payload` under an already-held write gate.
    pub fn apply(&self, payload: &str, writer: &StoreWriter<'_>) -> AugmentOutcome {
        let batch = match self.validate(payload, writer.graph()) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "generated facts rejected");
                return AugmentOutcome::rejected(annotate(payload, e.annotation_label(), &e.to_string()));
            }
        };

        let triples_added = match writer.merge(&batch.triples) {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!(error = %e, "merging generated facts failed");
                return AugmentOutcome::rejected(annotate(payload, "Merge failed", &e.to_string()));
            }
        };
        tracing::info!(
            batch = batch.triples.len(),
            added = triples_added,
            "generated facts merged"
        );

        let snapshot = self.snapshots.as_ref().and_then(|snapshots| {
            snapshots
                .write(writer.graph())
                .map_err(|e| tracing::warn!(error = %e, "snapshot failed"))
                .ok()
        });

        AugmentOutcome {
            applied: true,
            facts_text: Some(batch.payload),
            triples_added,
            snapshot,
        }
    }

    /// Draft, then validate and merge under the write gate.
    pub fn augment(&self, question: &str, query: &StructuredQuery, store: &GraphStore) -> AugmentOutcome {
        let Some(payload) = self.draft(question, query, store) else {
            return AugmentOutcome::default();
        };
        let writer = store.writer();
        self.apply(&payload, &writer)
    }
}

/// Append the failure reason as Turtle comments.
fn annotate(payload: &str, label: &str, reason: &str) -> String {
    let mut text = payload.trim_end().to_string();
    text.push_str("\n\n");
    for (i, line) in reason.lines().enumerate() {
        if i == 0 {
            text.push_str(&format!("# {label}: {line}\n"));
        } else {
            text.push_str(&format!("#   {line}\n"));
        }
    }
    text.trim_end().to_string()
}
