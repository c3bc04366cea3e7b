//! Shared pooled HTTP client and the provider-adapter retry policy.
//!
//! Grounded on the inherited `http_client_pool.rs`: a `DashMap` keyed by base URL,
//! populated lazily via `once_cell::sync::Lazy`, so every adapter pointed at the same
//! backend reuses one keep-alive connection pool for the process lifetime. Unlike the
//! inherited pool, the builder's limits come from [`GatewayConfig`](crate::config::GatewayConfig)
//! rather than fixed constants; [`configure_pool`] records them once at startup, and
//! [`get_or_create_client`] falls back to the same defaults the config layer itself
//! uses when nothing has called it yet (e.g. unit tests that build a client directly).

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use rand::Rng;
use std::time::Duration;

static CLIENT_POOL: Lazy<DashMap<String, reqwest::Client>> = Lazy::new(DashMap::new);
static POOL_LIMITS: OnceCell<PoolLimits> = OnceCell::new();

#[derive(Clone, Copy)]
struct PoolLimits {
    max_idle_per_host: usize,
    keepalive: Duration,
    timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolLimits { max_idle_per_host: 100, keepalive: Duration::from_secs(60), timeout: Duration::from_secs(30) }
    }
}

/// Records the pool limits every client built afterwards should use. Call once at
/// process startup from the configured [`GatewayConfig`]; later calls are ignored, so
/// it is safe to call speculatively.
pub fn configure_pool(max_connections: usize, max_keepalive: usize, timeout_seconds: u64) {
    let _ = POOL_LIMITS.set(PoolLimits {
        max_idle_per_host: max_connections,
        keepalive: Duration::from_secs(max_keepalive as u64),
        timeout: Duration::from_secs(timeout_seconds),
    });
}

pub fn get_or_create_client(base_url: &str) -> reqwest::Client {
    if let Some(existing) = CLIENT_POOL.get(base_url) {
        return existing.clone();
    }
    CLIENT_POOL
        .entry(base_url.to_string())
        .or_insert_with(create_pooled_client)
        .clone()
}

fn create_pooled_client() -> reqwest::Client {
    let limits = POOL_LIMITS.get().copied().unwrap_or_default();
    reqwest::Client::builder()
        .pool_max_idle_per_host(limits.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(limits.keepalive)
        .connect_timeout(Duration::from_secs(30))
        .timeout(limits.timeout)
        .build()
        .expect("failed to build pooled reqwest client")
}

/// Whether an HTTP status is an idempotent-retry candidate per §7: 5xx or 429.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Exponential backoff with jitter, bounded by `max_attempts`. Request bodies are
/// never mutated between attempts, matching the no-side-effect retry contract in §7.
pub async fn retry_with_backoff<T, E, F, Fut>(max_attempts: u32, mut attempt: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, RetryOutcome<E>>>,
{
    let mut last_err = None;
    for n in 0..max_attempts.max(1) {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(RetryOutcome::Retryable(e)) => {
                last_err = Some(e);
                if n + 1 < max_attempts {
                    let base_ms = 200u64 * 2u64.pow(n);
                    let jitter_ms = rand::thread_rng().gen_range(0..100);
                    tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
                }
            }
            Err(RetryOutcome::Terminal(e)) => return Err(e),
        }
    }
    Err(last_err.expect("retry loop always records an error before exhausting attempts"))
}

pub enum RetryOutcome<E> {
    Retryable(E),
    Terminal(E),
}
