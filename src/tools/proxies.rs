//! Proxy tool handlers backing the downstream-service tools in §4.5: thin wrappers
//! that hand a tool call's arguments to a downstream client, gated by a circuit
//! breaker from the shared [`crate::circuit_breaker::CircuitBreakerRegistry`].

use super::ToolHandler;
use crate::circuit_breaker::CircuitBreaker;
use crate::downstream::SemanticSearchClient;
use crate::fallback_chain::FallbackChain;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Calls [`SemanticSearchClient::search`] behind a circuit breaker. Arguments:
/// `{"query": "...", "top_k": 5}`.
pub struct SemanticSearchTool {
    client: Arc<SemanticSearchClient>,
    breaker: Arc<CircuitBreaker>,
}

impl SemanticSearchTool {
    pub fn new(client: Arc<SemanticSearchClient>, breaker: Arc<CircuitBreaker>) -> Self {
        SemanticSearchTool { client, breaker }
    }
}

#[async_trait]
impl ToolHandler for SemanticSearchTool {
    async fn call(&self, arguments: Value) -> Result<Value, String> {
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or_default().to_string();
        let top_k = arguments.get("top_k").and_then(Value::as_u64).unwrap_or(5) as u32;
        let client = self.client.clone();

        self.breaker
            .call(move || {
                let client = client.clone();
                let query = query.clone();
                async move { client.search(&query, top_k).await }
            })
            .await
            .map_err(|e| e.to_string())
    }
}

/// Invokes a named agent through the ai-agents fallback chain (breaker-gated primary,
/// local-cache terminal). Arguments: `{"agent": "...", "input": {...}}`.
pub struct AiAgentsTool {
    fallback: Arc<FallbackChain>,
}

impl AiAgentsTool {
    pub fn new(fallback: Arc<FallbackChain>) -> Self {
        AiAgentsTool { fallback }
    }
}

#[async_trait]
impl ToolHandler for AiAgentsTool {
    async fn call(&self, arguments: Value) -> Result<Value, String> {
        let payload = arguments.to_string();
        let raw = self.fallback.invoke(&payload).await.map_err(|e| e.to_string())?;
        Ok(serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)))
    }
}
