//! Fallback Chain (§4.7): ordered backends tried in sequence, skipping any whose
//! breaker is open, terminating in a local content-addressed cache so the chain can
//! (almost) always return something.

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::error::GatewayError;
use crate::observability::MetricsSink;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[async_trait]
pub trait FallbackBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, payload: &str) -> Result<String, String>;
}

/// Terminal content-addressed cache: key = SHA-256 of the request payload. A miss is
/// a genuine chain failure rather than a silently-synthesized answer.
pub struct LocalCacheBackend {
    cache: DashMap<String, String>,
}

impl Default for LocalCacheBackend {
    fn default() -> Self {
        LocalCacheBackend { cache: DashMap::new() }
    }
}

impl LocalCacheBackend {
    fn key_for(payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn put(&self, payload: &str, value: impl Into<String>) {
        self.cache.insert(Self::key_for(payload), value.into());
    }
}

#[async_trait]
impl FallbackBackend for LocalCacheBackend {
    fn name(&self) -> &str {
        "local_cache"
    }

    async fn invoke(&self, payload: &str) -> Result<String, String> {
        self.cache
            .get(&Self::key_for(payload))
            .map(|v| v.clone())
            .ok_or_else(|| "cache miss".to_string())
    }
}

struct Link {
    backend: Arc<dyn FallbackBackend>,
    breaker: Arc<CircuitBreaker>,
}

pub struct FallbackChain {
    name: String,
    links: Vec<Link>,
    metrics: Arc<dyn MetricsSink>,
}

impl FallbackChain {
    pub fn new(name: impl Into<String>, metrics: Arc<dyn MetricsSink>) -> Self {
        FallbackChain { name: name.into(), links: Vec::new(), metrics }
    }

    pub fn push(&mut self, backend: Arc<dyn FallbackBackend>, breaker: Arc<CircuitBreaker>) {
        self.links.push(Link { backend, breaker });
    }

    pub async fn invoke(&self, payload: &str) -> Result<String, GatewayError> {
        for link in &self.links {
            if link.breaker.state().await == CircuitState::Open {
                log::debug!("fallback chain '{}': skipping '{}' (circuit open)", self.name, link.backend.name());
                continue;
            }

            self.metrics.record_attempt(link.backend.name());
            let backend = link.backend.clone();
            let payload_owned = payload.to_string();
            let result = link
                .breaker
                .call(move || {
                    let backend = backend.clone();
                    let payload_owned = payload_owned.clone();
                    async move { backend.invoke(&payload_owned).await }
                })
                .await;

            match result {
                Ok(value) => {
                    self.metrics.record_success(link.backend.name());
                    return Ok(value);
                }
                Err(e) => {
                    log::warn!("fallback chain '{}': backend '{}' failed: {}", self.name, link.backend.name(), e);
                }
            }
        }

        Err(GatewayError::FallbackExhausted(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopMetricsSink;
    use std::time::Duration;

    struct AlwaysFails;

    #[async_trait]
    impl FallbackBackend for AlwaysFails {
        fn name(&self) -> &str {
            "always_fails"
        }
        async fn invoke(&self, _payload: &str) -> Result<String, String> {
            Err("nope".to_string())
        }
    }

    fn breaker(name: &str) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(name, 1, Duration::from_secs(60), 1, Arc::new(NoopMetricsSink)))
    }

    #[tokio::test]
    async fn first_success_wins() {
        let cache = Arc::new(LocalCacheBackend::default());
        cache.put("payload", "cached answer");

        let mut chain = FallbackChain::new("search", Arc::new(NoopMetricsSink));
        chain.push(Arc::new(AlwaysFails), breaker("primary"));
        chain.push(cache, breaker("cache"));

        let result = chain.invoke("payload").await.unwrap();
        assert_eq!(result, "cached answer");
    }

    #[tokio::test]
    async fn exhausted_chain_with_cache_miss_fails_explicitly() {
        let mut chain = FallbackChain::new("search", Arc::new(NoopMetricsSink));
        chain.push(Arc::new(AlwaysFails), breaker("primary"));
        chain.push(Arc::new(LocalCacheBackend::default()), breaker("cache"));

        let result = chain.invoke("payload").await;
        assert!(matches!(result, Err(GatewayError::FallbackExhausted(_))));
    }

    #[tokio::test]
    async fn open_breaker_skips_backend() {
        let primary_breaker = breaker("primary");
        let _: Result<(), GatewayError> = primary_breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(primary_breaker.state().await, CircuitState::Open);

        let cache = Arc::new(LocalCacheBackend::default());
        cache.put("payload", "cached answer");

        let mut chain = FallbackChain::new("search", Arc::new(NoopMetricsSink));
        chain.push(Arc::new(AlwaysFails), primary_breaker);
        chain.push(cache, breaker("cache"));

        let result = chain.invoke("payload").await.unwrap();
        assert_eq!(result, "cached answer");
    }
}
