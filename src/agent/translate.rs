//! Natural language to SPARQL.

use std::sync::Arc;

use serde_json::Value;

use super::llm::{extract_json_object, OutputContract, TextGenerator};
use super::prompts::{translation_prompt, FewShotExample};
use crate::graph::schema::SchemaDescription;

/// A query produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredQuery {
    /// SPARQL text; may be empty when the model declined.
    pub text: String,
    /// The entity the question is about, when the model named one.
    pub scope: Option<String>,
}

impl StructuredQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// The model explicitly signalled it could not form a query.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Converts questions into structured queries with a single generator call.
pub struct Translator {
    generator: Arc<dyn TextGenerator>,
    examples: Vec<FewShotExample>,
}

impl Translator {
    pub fn new(generator: Arc<dyn TextGenerator>, examples: Vec<FewShotExample>) -> Self {
        Self {
            generator,
            examples,
        }
    }

    /// Translate `question`, or `None` when the model gave nothing usable.
    ///
    /// An empty `sparql_query` is returned as a blank query, not `None`.
    pub fn translate(&self, question: &str, schema: &SchemaDescription) -> Option<StructuredQuery> {
        let prompt = translation_prompt(question, schema, &self.examples);
        let raw = match self
            .generator
            .generate(&prompt, Some(&OutputContract::sparql_query()))
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "query generation failed");
                return None;
            }
        };
        tracing::debug!(raw = %raw, "query generation output");

        let Some(object) = extract_json_object(&raw) else {
            tracing::warn!("query generation output held no JSON object");
            return None;
        };
        let Some(text) = object.get("sparql_query").and_then(Value::as_str) else {
            tracing::warn!("query generation output has no string \"sparql_query\" field");
            return None;
        };

        let scope = object
            .get("scope")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let query = StructuredQuery {
            text: text.trim().to_string(),
            scope,
        };
        if query.is_blank() {
            tracing::info!("model declined to form a query");
        } else {
            tracing::info!(query = %query.text, scope = ?query.scope, "query generated");
        }
        Some(query)
    }
}
