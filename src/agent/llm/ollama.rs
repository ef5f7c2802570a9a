//! Local Ollama provider.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use super::{map_ureq_error, LlmError, LlmResult, OutputContract, TextGenerator};

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 60,
        }
    }
}

/// Client for the Ollama REST API.
pub struct OllamaClient {
    config: OllamaConfig,
    agent: ureq::Agent,
    /// Models available locally after `ping()`.
    available_models: Mutex<Vec<String>>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();
        Self {
            config,
            agent,
            available_models: Mutex::new(Vec::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Ping the server via `/api/tags` and refresh the local model list.
    pub fn ping(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();

        let models = match agent.get(&url).call() {
            Ok(resp) if resp.status() == 200 => resp
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<Value>(&body).ok())
                .map(|json| parse_model_names(&json)),
            _ => None,
        };

        let mut cache = self
            .available_models
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match models {
            Some(names) => {
                *cache = names;
                true
            }
            None => {
                cache.clear();
                false
            }
        }
    }

    /// Whether the configured model was listed by the last ping.
    pub fn has_model(&self) -> bool {
        let target = &self.config.model;
        self.available_models
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|m| m == target || m.split(':').next() == Some(target.as_str()))
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(contract) = contract {
            body["format"] = contract.schema().clone();
        }

        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "ollama generate");
        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e| map_ureq_error(e, &self.config.base_url, self.config.timeout_secs))?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        let json: Value = serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        response_text(&json)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn parse_model_names(json: &Value) -> Vec<String> {
    json["models"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn response_text(json: &Value) -> LlmResult<String> {
    let text = json["response"].as_str().ok_or_else(|| LlmError::ParseError {
        message: "missing 'response' field".into(),
    })?;
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse {
            reason: json["done_reason"].as_str().map(str::to_string),
        });
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn unreachable_server_pings_false() {
        let client = OllamaClient::new(OllamaConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });
        assert!(!client.ping());
        assert!(!client.has_model());
    }

    #[test]
    fn model_names_from_tags() {
        let json = serde_json::json!({
            "models": [{"name": "llama3.2:latest"}, {"name": "qwen2.5:7b"}]
        });
        let names = parse_model_names(&json);
        assert_eq!(names, vec!["llama3.2:latest", "qwen2.5:7b"]);

        let client = OllamaClient::new(OllamaConfig::default());
        *client.available_models.lock().unwrap() = names;
        assert!(client.has_model());
    }

    #[test]
    fn response_field_extracted() {
        let ok = serde_json::json!({"response": "{\"sparql_query\": \"\"}", "done": true});
        assert_eq!(response_text(&ok).unwrap(), "{\"sparql_query\": \"\"}");

        let missing = serde_json::json!({"done": true});
        assert!(matches!(response_text(&missing), Err(LlmError::ParseError { .. })));

        let blank = serde_json::json!({"response": "  ", "done_reason": "length"});
        match response_text(&blank) {
            Err(LlmError::EmptyResponse { reason }) => assert_eq!(reason.as_deref(), Some("length")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
