//! Per-client token-bucket rate limiter (§4.4).
//!
//! Adapted from the inherited `RateLimiter` resource pattern (per-key tracker maps
//! guarded by locks), replaced here with a single token-bucket bucket per key instead
//! of the fixed-window counters that pattern used, to satisfy the exact
//! `min(N, burst)` concurrent-admission invariant. Unlike the `AIProviderManager`
//! rate limiter elsewhere in the corpus, this limiter never sleeps a caller: refusal
//! is immediate and carries `Retry-After`.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: u64,
    pub retry_after: u64,
}

pub struct RateLimiter {
    requests_per_minute: f64,
    burst: f64,
    buckets: Arc<DashMap<String, Arc<Mutex<Bucket>>>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: f64, burst: f64) -> Self {
        RateLimiter { requests_per_minute, burst, buckets: Arc::new(DashMap::new()) }
    }

    fn rate_per_second(&self) -> f64 {
        self.requests_per_minute / 60.0
    }

    fn bucket_for(&self, client_key: &str) -> Arc<Mutex<Bucket>> {
        self.buckets
            .entry(client_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket { tokens: self.burst, last_refill: Instant::now() })))
            .clone()
    }

    /// Serialized per key via the bucket's own `Mutex`, so concurrent calls for the
    /// same `client_key` are strictly ordered and `0 <= tokens <= burst` holds at
    /// every observation point.
    pub async fn is_allowed(&self, client_key: &str) -> RateLimitDecision {
        let bucket = self.bucket_for(client_key);
        let mut guard = bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(guard.last_refill).as_secs_f64();
        guard.tokens = (guard.tokens + elapsed * self.rate_per_second()).min(self.burst);
        guard.last_refill = now;

        let allowed = guard.tokens >= 1.0;
        if allowed {
            guard.tokens -= 1.0;
        }

        let remaining = guard.tokens.floor().max(0.0) as u32;
        let seconds_to_next_token = if guard.tokens >= 1.0 {
            0.0
        } else {
            ((1.0 - guard.tokens) / self.rate_per_second()).max(0.0)
        };
        let now_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

        RateLimitDecision {
            allowed,
            remaining,
            limit: self.burst as u32,
            reset_at: now_epoch + seconds_to_next_token.ceil() as u64,
            retry_after: seconds_to_next_token.ceil() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn scenario_d_race_free_rate_limit() {
        let limiter = Arc::new(RateLimiter::new(60.0, 10.0));
        let allowed_count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let allowed_count = allowed_count.clone();
            handles.push(tokio::spawn(async move {
                let decision = limiter.is_allowed("c1").await;
                if decision.allowed {
                    allowed_count.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(allowed_count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn tokens_never_exceed_burst() {
        let limiter = RateLimiter::new(6000.0, 5.0);
        for _ in 0..3 {
            limiter.is_allowed("c2").await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let decision = limiter.is_allowed("c2").await;
        assert!(decision.remaining <= 5);
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(60.0, 1.0);
        let a = limiter.is_allowed("a").await;
        let b = limiter.is_allowed("b").await;
        assert!(a.allowed);
        assert!(b.allowed);
    }
}
