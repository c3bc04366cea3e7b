//! Client for the ai-agents microservice. Same pooling and timeout posture as
//! [`super::semantic_search::SemanticSearchClient`]. [`AiAgentsBackend`] below is the
//! first link in the fallback chain `bin/server.rs` builds for this resource (§4.7):
//! it runs behind a circuit breaker and falls through to a terminal local cache when
//! the breaker is open or the call itself fails.

use crate::fallback_chain::FallbackBackend;
use crate::providers::common::get_or_create_client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub struct AiAgentsClient {
    base_url: String,
    timeout: Duration,
}

impl AiAgentsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        AiAgentsClient { base_url: base_url.into(), timeout }
    }

    pub async fn invoke_agent(&self, agent_name: &str, input: Value) -> Result<Value, String> {
        let client = get_or_create_client(&self.base_url);
        let resp = client
            .post(format!("{}/agents/{agent_name}/invoke", self.base_url))
            .json(&json!({ "input": input }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("ai-agents responded with {}", resp.status()));
        }
        resp.json::<Value>().await.map_err(|e| e.to_string())
    }
}

/// Fallback-chain link wrapping [`AiAgentsClient::invoke_agent`]. Expects a payload of
/// `{"agent": "...", "input": ...}`; the agent name travels inside the payload since
/// [`FallbackBackend::invoke`] takes a single string.
pub struct AiAgentsBackend {
    client: Arc<AiAgentsClient>,
}

impl AiAgentsBackend {
    pub fn new(client: Arc<AiAgentsClient>) -> Self {
        AiAgentsBackend { client }
    }
}

#[async_trait]
impl FallbackBackend for AiAgentsBackend {
    fn name(&self) -> &str {
        "ai_agents"
    }

    async fn invoke(&self, payload: &str) -> Result<String, String> {
        let parsed: Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
        let agent = parsed.get("agent").and_then(Value::as_str).ok_or_else(|| "payload missing 'agent' field".to_string())?;
        let input = parsed.get("input").cloned().unwrap_or(Value::Null);
        let result = self.client.invoke_agent(agent, input).await?;
        Ok(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_payload_fails_before_any_network_call() {
        let backend = AiAgentsBackend::new(Arc::new(AiAgentsClient::new("http://127.0.0.1:0", Duration::from_secs(1))));
        let result = backend.invoke("not json").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn payload_missing_agent_field_fails_before_any_network_call() {
        let backend = AiAgentsBackend::new(Arc::new(AiAgentsClient::new("http://127.0.0.1:0", Duration::from_secs(1))));
        let result = backend.invoke(r#"{"input": {}}"#).await;
        assert!(result.is_err());
    }
}
