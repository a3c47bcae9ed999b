//! OpenAI-compatible generation provider.
//!
//! Works against OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the OpenAI chat completions API format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ProviderError;
use crate::providers::{Generation, GenerationProvider};
use crate::types::ToolCall;

/// Connection settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    /// Id the provider competes under, e.g. "gpt-4o" or "ollama-qwen".
    pub id: String,
    /// Base URL including the API version segment, e.g.
    /// `https://api.openai.com/v1` or `http://localhost:11434/v1`.
    pub base_url: String,
    pub model: String,
    /// API key; optional for local endpoints.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Dollar cost per input token; 0.0 for local models.
    #[serde(default)]
    pub input_cost_per_token: f64,
    /// Dollar cost per output token; 0.0 for local models.
    #[serde(default)]
    pub output_cost_per_token: f64,
}

fn default_temperature() -> f64 {
    0.7
}

/// Generation provider backed by an OpenAI-compatible chat endpoint.
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Render the request context as a system message so providers that
    /// never saw the competition API still receive it.
    fn context_system_message(context: &BTreeMap<String, String>) -> Option<String> {
        if context.is_empty() {
            return None;
        }
        let rendered = context
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!("Relevant context:\n{rendered}"))
    }

    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::AuthFailed {
                provider: self.config.id.clone(),
            },
            _ => ProviderError::Generation {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }

    fn parse_response(&self, json: &Value) -> Result<Generation, ProviderError> {
        let message = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "response has no choices[0].message".into(),
            })?;

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
            for call in calls {
                let Some(function) = call.get("function") else {
                    continue;
                };
                let name = function
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                let arguments = function
                    .get("arguments")
                    .and_then(|a| a.as_str())
                    .and_then(|a| serde_json::from_str(a).ok())
                    .unwrap_or(Value::Null);
                tool_calls.push(ToolCall { name, arguments });
            }
        }

        let cost_usd = json
            .get("usage")
            .map(|usage| {
                let input = usage
                    .get("prompt_tokens")
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0) as f64;
                let output = usage
                    .get("completion_tokens")
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0) as f64;
                input * self.config.input_cost_per_token
                    + output * self.config.output_cost_per_token
            })
            .unwrap_or(0.0);

        Ok(Generation {
            text,
            tool_calls,
            cost_usd,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<Generation, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut messages = Vec::new();
        if let Some(system) = Self::context_system_message(context) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        debug!(url = %url, model = %self.config.model, "sending chat completion request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| ProviderError::Generation {
            message: format!("request failed: {e}"),
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| ProviderError::Generation {
                message: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(self.map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| ProviderError::ResponseParse {
                message: format!("invalid JSON: {e}"),
            })?;

        self.parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(OpenAiCompatConfig {
            id: "test".into(),
            base_url: "http://localhost:11434/v1".into(),
            model: "qwen2.5:7b".into(),
            api_key: None,
            temperature: 0.7,
            max_tokens: None,
            input_cost_per_token: 0.000_001,
            output_cost_per_token: 0.000_002,
        })
    }

    #[test]
    fn test_parse_response_text_and_cost() {
        let provider = test_provider();
        let json = json!({
            "choices": [{ "message": { "content": "hello there" } }],
            "usage": { "prompt_tokens": 100, "completion_tokens": 50 }
        });
        let generation = provider.parse_response(&json).unwrap();
        assert_eq!(generation.text, "hello there");
        assert!((generation.cost_usd - (100.0 * 0.000_001 + 50.0 * 0.000_002)).abs() < 1e-12);
    }

    #[test]
    fn test_parse_response_tool_calls() {
        let provider = test_provider();
        let json = json!({
            "choices": [{ "message": {
                "content": null,
                "tool_calls": [{
                    "function": { "name": "lookup", "arguments": "{\"q\": \"rust\"}" }
                }]
            }}]
        });
        let generation = provider.parse_response(&json).unwrap();
        assert!(generation.text.is_empty());
        assert_eq!(generation.tool_calls.len(), 1);
        assert_eq!(generation.tool_calls[0].name, "lookup");
        assert_eq!(generation.tool_calls[0].arguments["q"], "rust");
    }

    #[test]
    fn test_parse_response_missing_choices() {
        let provider = test_provider();
        let result = provider.parse_response(&json!({ "error": "nope" }));
        assert!(matches!(result, Err(ProviderError::ResponseParse { .. })));
    }

    #[test]
    fn test_context_system_message() {
        let mut ctx = BTreeMap::new();
        ctx.insert("audience".to_string(), "beginners".to_string());
        ctx.insert("tone".to_string(), "friendly".to_string());
        let system = OpenAiCompatProvider::context_system_message(&ctx).unwrap();
        assert!(system.contains("audience: beginners"));
        assert!(system.contains("tone: friendly"));
        assert!(OpenAiCompatProvider::context_system_message(&BTreeMap::new()).is_none());
    }
}
