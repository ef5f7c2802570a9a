//! Generative text capability.
//!
//! The pipeline talks to a language model only through [`TextGenerator`], so
//! every stage can be driven by a deterministic fake in tests. The model is
//! treated as unreliable: transport failures, timeouts, empty output and
//! off-contract output are all ordinary outcomes that each stage maps to its
//! own fallback.
//!
//! Providers:
//! - [`GeminiClient`]: Google `generateContent` with JSON-schema constrained output
//! - [`OllamaClient`]: local Ollama `/api/generate` with `format` schemas
//!
//! [`Deadline`] bounds the latency of any generator.

pub mod deadline;
pub mod extract;
pub mod gemini;
pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{ConfigError, LlmConfig, Provider};

pub use deadline::Deadline;
pub use extract::{extract_json_object, strip_code_fence};
pub use gemini::{GeminiClient, GeminiConfig};
pub use ollama::{OllamaClient, OllamaConfig};

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("language model is not reachable at {url}")]
    #[diagnostic(
        code(kg::llm::unavailable),
        help("Check the provider URL and network access (for Ollama: `ollama serve`).")
    )]
    Unavailable { url: String },

    #[error("language model request failed: {message}")]
    #[diagnostic(
        code(kg::llm::request_failed),
        help("Check the model name, the API key and the provider's status.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse language model response: {message}")]
    #[diagnostic(
        code(kg::llm::parse_error),
        help("The provider returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("language model returned no usable content{}", reason_suffix(.reason))]
    #[diagnostic(
        code(kg::llm::empty),
        help("The model produced no candidates; the prompt may have been blocked or truncated.")
    )]
    EmptyResponse { reason: Option<String> },

    #[error("language model call timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(kg::llm::timeout),
        help("Increase `llm.timeout_secs` or use a faster model.")
    )]
    Timeout { timeout_ms: u64 },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(" ({r})")).unwrap_or_default()
}

/// Shape the model's output must take: a JSON schema for a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputContract {
    schema: Value,
}

impl OutputContract {
    pub fn new(schema: Value) -> Self {
        Self { schema }
    }

    /// An object whose fields are all strings.
    pub fn string_object(required: &[&str], optional: &[&str]) -> Self {
        let mut properties = serde_json::Map::new();
        for field in required.iter().chain(optional) {
            properties.insert((*field).to_string(), json!({ "type": "string" }));
        }
        Self::new(json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }))
    }

    /// The translation contract: `sparql_query` plus an optional `scope` entity.
    pub fn sparql_query() -> Self {
        Self::string_object(&["sparql_query"], &["scope"])
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

/// A text-generation capability.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion. When a contract is given, providers that support
    /// constrained decoding are asked to honour it; callers still validate.
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String> {
        (**self).generate(prompt, contract)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String> {
        (**self).generate(prompt, contract)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the configured provider, wrapped in a [`Deadline`].
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, ConfigError> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let provider: Arc<dyn TextGenerator> = match config.provider {
        Provider::Gemini => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingApiKey {
                    env: config.api_key_env.clone(),
                })?;
            let mut gemini = GeminiConfig {
                model: config.model.clone(),
                api_key,
                timeout_secs: config.timeout_secs,
                ..Default::default()
            };
            if let Some(url) = &config.base_url {
                gemini.base_url = url.clone();
            }
            Arc::new(GeminiClient::new(gemini))
        }
        Provider::Ollama => {
            let mut ollama = OllamaConfig {
                model: config.model.clone(),
                timeout_secs: config.timeout_secs,
                ..Default::default()
            };
            if let Some(url) = &config.base_url {
                ollama.base_url = url.clone();
            }
            let client = OllamaClient::new(ollama);
            if !client.ping() {
                tracing::warn!(url = %client.base_url(), "Ollama did not answer; requests will fail until it is reachable");
            } else if !client.has_model() {
                tracing::warn!(model = %client.model(), "configured model is not pulled locally");
            }
            Arc::new(client)
        }
    };
    let bounded = Deadline::new(provider, timeout);
    tracing::info!(
        provider = bounded.name(),
        model = %config.model,
        timeout_secs = bounded.timeout().as_secs(),
        "language model configured"
    );
    Ok(Arc::new(bounded))
}

/// Map a ureq failure onto the LLM error taxonomy.
pub(crate) fn map_ureq_error(err: ureq::Error, url: &str, timeout_secs: u64) -> LlmError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            LlmError::RequestFailed {
                message: format!("server returned status {code}: {}", truncate(&body, 300)),
            }
        }
        ureq::Error::Transport(transport) => match transport.kind() {
            ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => LlmError::Unavailable {
                url: url.to_string(),
            },
            ureq::ErrorKind::Io if transport.to_string().contains("timed out") => LlmError::Timeout {
                timeout_ms: timeout_secs.saturating_mul(1000),
            },
            _ => LlmError::RequestFailed {
                message: transport.to_string(),
            },
        },
    }
}

/// Cut a string to at most `max` characters, on a char boundary.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
