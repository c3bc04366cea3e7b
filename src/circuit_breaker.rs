//! Circuit breaker (§4.7): per-resource CLOSED/OPEN/HALF_OPEN state machine, with all
//! transitions serialized behind a single lock per resource.

use crate::error::GatewayError;
use crate::observability::MetricsSink;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    half_open_successes: u32,
}

pub struct CircuitBreaker {
    resource: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_calls: u32,
    inner: Mutex<Inner>,
    half_open_in_flight: AtomicU32,
    metrics: Arc<dyn MetricsSink>,
}

impl CircuitBreaker {
    pub fn new(
        resource: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        half_open_max_calls: u32,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        CircuitBreaker {
            resource: resource.into(),
            failure_threshold,
            recovery_timeout,
            half_open_max_calls,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                half_open_successes: 0,
            }),
            half_open_in_flight: AtomicU32::new(0),
            metrics,
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Checks admission and, if granted, runs `call`, feeding the outcome back into
    /// the state machine. Mirrors the `call_with_breaker` shape used throughout the
    /// corpus's resilience-pattern examples, generalized to an async closure.
    pub async fn call<T, E, F, Fut>(&self, call: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if !self.admit().await {
            return Err(GatewayError::CircuitOpen(self.resource.clone()));
        }

        match call().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure().await;
                Err(GatewayError::Provider(e.to_string()))
            }
        }
    }

    /// Returns whether a call may proceed right now, transitioning CLOSED→no-op,
    /// OPEN→HALF_OPEN (after `recovery_timeout`), and gating HALF_OPEN admission by
    /// `half_open_max_calls` in-flight probes.
    async fn admit(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner.last_failure_time.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= self.recovery_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_successes = 0;
                    self.half_open_in_flight.store(0, Ordering::SeqCst);
                    self.try_take_half_open_permit()
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.try_take_half_open_permit(),
        }
    }

    fn try_take_half_open_permit(&self) -> bool {
        let mut current = self.half_open_in_flight.load(Ordering::SeqCst);
        loop {
            if current >= self.half_open_max_calls {
                return false;
            }
            match self.half_open_in_flight.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.half_open_max_calls {
                    self.transition(&mut inner, CircuitState::Closed);
                    inner.failure_count = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.last_failure_time = Some(Instant::now());
                if inner.failure_count >= self.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.last_failure_time = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {
                inner.last_failure_time = Some(Instant::now());
            }
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        self.metrics.record_transition(&self.resource, from.label(), to.label());
        log::info!("circuit '{}' transitioned {} -> {}", self.resource, from.label(), to.label());
    }
}

pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_calls: u32,
    metrics: Arc<dyn MetricsSink>,
}

impl CircuitBreakerRegistry {
    pub fn new(
        failure_threshold: u32,
        recovery_timeout: Duration,
        half_open_max_calls: u32,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        CircuitBreakerRegistry {
            breakers: DashMap::new(),
            failure_threshold,
            recovery_timeout,
            half_open_max_calls,
            metrics,
        }
    }

    pub fn get(&self, resource: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(resource.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    resource,
                    self.failure_threshold,
                    self.recovery_timeout,
                    self.half_open_max_calls,
                    self.metrics.clone(),
                ))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopMetricsSink;

    fn breaker(failure_threshold: u32, recovery_timeout: Duration, half_open_max_calls: u32) -> CircuitBreaker {
        CircuitBreaker::new("test", failure_threshold, recovery_timeout, half_open_max_calls, Arc::new(NoopMetricsSink))
    }

    #[tokio::test]
    async fn scenario_e_circuit_trip_and_recover() {
        let cb = breaker(3, Duration::from_millis(100), 1);

        for _ in 0..3 {
            let _: Result<(), GatewayError> =
                cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let blocked = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(matches!(blocked, Err(GatewayError::CircuitOpen(_))));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_circuit() {
        let cb = breaker(1, Duration::from_millis(10), 2);
        let _: Result<(), GatewayError> = cb.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _: Result<(), GatewayError> = cb.call(|| async { Err::<(), _>("still broken") }).await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }
}
