//! Google Gemini provider (`generateContent`).

use std::time::Duration;

use serde_json::{json, Map, Value};

use super::{map_ureq_error, LlmError, LlmResult, OutputContract, TextGenerator};

/// Configuration for the Gemini client.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API root, without the `/models/...` path.
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.0-flash".into(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Client for the Gemini REST API.
pub struct GeminiClient {
    config: GeminiConfig,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();
        Self { config, agent }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str, contract: Option<&OutputContract>) -> LlmResult<String> {
        let url = self.endpoint();
        let body = request_body(prompt, contract);
        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), constrained = contract.is_some(), "gemini generateContent");
        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("x-goog-api-key", &self.config.api_key)
            .send_string(&body_str)
            .map_err(|e| map_ureq_error(e, &self.config.base_url, self.config.timeout_secs))?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        let json: Value = serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        candidate_text(&json)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn request_body(prompt: &str, contract: Option<&OutputContract>) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
    });
    if let Some(contract) = contract {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": gemini_schema(contract.schema()),
        });
    }
    body
}

/// Convert a JSON schema into Gemini's OpenAPI subset: upper-case type names,
/// no `additionalProperties`.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "additionalProperties" | "$schema" => {}
                    "type" => {
                        let upper = value
                            .as_str()
                            .map(|t| Value::String(t.to_ascii_uppercase()))
                            .unwrap_or_else(|| value.clone());
                        out.insert(key.clone(), upper);
                    }
                    _ => {
                        out.insert(key.clone(), gemini_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

/// Concatenated text of the first candidate.
fn candidate_text(json: &Value) -> LlmResult<String> {
    let candidate = &json["candidates"][0];
    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = json["promptFeedback"]["blockReason"]
            .as_str()
            .or_else(|| candidate["finishReason"].as_str())
            .map(str::to_string);
        return Err(LlmError::EmptyResponse { reason });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_converted_recursively() {
        let contract = OutputContract::new(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "sparql_query": { "type": "string" },
                "tags": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["sparql_query"]
        }));
        let converted = gemini_schema(contract.schema());
        assert_eq!(converted["type"], "OBJECT");
        assert!(converted.get("additionalProperties").is_none());
        assert_eq!(converted["properties"]["sparql_query"]["type"], "STRING");
        assert_eq!(converted["properties"]["tags"]["items"]["type"], "STRING");
        assert_eq!(converted["required"], json!(["sparql_query"]));
    }

    #[test]
    fn body_carries_generation_config_only_with_contract() {
        let plain = request_body("hi", None);
        assert_eq!(plain["contents"][0]["parts"][0]["text"], "hi");
        assert!(plain.get("generationConfig").is_none());

        let constrained = request_body("hi", Some(&OutputContract::sparql_query()));
        assert_eq!(
            constrained["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn parts_are_concatenated() {
        let json = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Orwell " }, { "text": "wrote it." }] } }]
        });
        assert_eq!(candidate_text(&json).unwrap(), "Orwell wrote it.");
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        match candidate_text(&json) {
            Err(LlmError::EmptyResponse { reason }) => assert_eq!(reason.as_deref(), Some("SAFETY")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn debug_hides_key() {
        let config = GeminiConfig {
            api_key: "secret-key".into(),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
