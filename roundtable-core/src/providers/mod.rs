//! Generation providers that compete in a round table.
//!
//! A provider is anything that can turn a prompt plus context into a text
//! response. Providers are registered with the engine under a stable id and
//! invited per request; the engine never cares how generation happens.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ProviderError;
use crate::types::ToolCall;

mod openai_compat;

pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};

/// One successful generation from a provider.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Estimated cost of the call in US dollars; 0.0 when unknown.
    pub cost_usd: f64,
}

impl Generation {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            cost_usd: 0.0,
        }
    }
}

/// Trait implemented by every competing provider.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Stable identifier used for registration, scoring, and learning.
    fn id(&self) -> &str;

    /// Generate a response for the prompt. Context entries are forwarded
    /// verbatim; how they are surfaced to the model is provider-specific.
    async fn generate(
        &self,
        prompt: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<Generation, ProviderError>;
}

/// Scripted in-memory provider for tests.
///
/// Responses are queued and consumed in order; an exhausted queue replays
/// the last queued response. Optional artificial delay and scripted failure
/// let tests exercise timeout and quorum paths.
pub struct MockProvider {
    id: String,
    responses: Mutex<Vec<String>>,
    delay: Option<Duration>,
    failure: Option<String>,
    cost_usd: f64,
}

impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            responses: Mutex::new(Vec::new()),
            delay: None,
            failure: None,
            cost_usd: 0.0,
        }
    }

    /// Queue a response to return, in FIFO order.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        {
            let mut queue = self.responses.lock().unwrap();
            queue.push(response.into());
        }
        self
    }

    /// Make every call fail with the given message.
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            responses: Mutex::new(Vec::new()),
            delay: None,
            failure: Some(message.into()),
            cost_usd: 0.0,
        }
    }

    /// Sleep for `delay` before responding; used to trigger timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report a fixed cost per call.
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        _prompt: &str,
        _context: &BTreeMap<String, String>,
    ) -> Result<Generation, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ProviderError::Generation {
                message: message.clone(),
            });
        }
        let text = {
            let mut queue = self.responses.lock().unwrap();
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue.first().cloned().unwrap_or_default()
            }
        };
        Ok(Generation {
            text,
            tool_calls: Vec::new(),
            cost_usd: self.cost_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_queued_responses_in_order() {
        let provider = MockProvider::new("mock")
            .with_response("first")
            .with_response("second");
        let ctx = BTreeMap::new();
        assert_eq!(provider.generate("p", &ctx).await.unwrap().text, "first");
        assert_eq!(provider.generate("p", &ctx).await.unwrap().text, "second");
        // Last response replays once the queue is down to one.
        assert_eq!(provider.generate("p", &ctx).await.unwrap().text, "second");
    }

    #[tokio::test]
    async fn test_mock_provider_failing() {
        let provider = MockProvider::failing("bad", "simulated outage");
        let result = provider.generate("p", &BTreeMap::new()).await;
        assert!(matches!(result, Err(ProviderError::Generation { .. })));
    }

    #[tokio::test]
    async fn test_mock_provider_cost() {
        let provider = MockProvider::new("mock").with_response("x").with_cost(0.002);
        let generation = provider.generate("p", &BTreeMap::new()).await.unwrap();
        assert!((generation.cost_usd - 0.002).abs() < f64::EPSILON);
    }
}
