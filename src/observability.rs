//! Observability hooks (§4.9): correlation ids and a metrics-sink seam.
//!
//! Metrics exposition format is out of scope (§1); `MetricsSink` is the interface the
//! circuit breaker and fallback chain call into, with a no-op default so the gateway
//! runs without a metrics backend wired up.

use std::fmt;
use uuid::Uuid;

pub trait MetricsSink: Send + Sync {
    fn record_transition(&self, resource: &str, from_state: &str, to_state: &str);
    fn record_attempt(&self, backend: &str);
    fn record_success(&self, backend: &str);
}

pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_transition(&self, resource: &str, from_state: &str, to_state: &str) {
        log::debug!("metric: circuit_transition resource={resource} from={from_state} to={to_state}");
    }

    fn record_attempt(&self, backend: &str) {
        log::debug!("metric: fallback_attempt backend={backend}");
    }

    fn record_success(&self, backend: &str) {
        log::debug!("metric: fallback_success backend={backend}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        CorrelationId(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide coarse-grained infrastructure status (§4.3.5), distinct from the
/// per-endpoint circuit breakers: a hint the orchestrator uses to short-circuit
/// optional collaborators like CMS within a cooldown window, rather than a strict
/// state machine.
pub struct InfraStatus {
    cms_available: std::sync::atomic::AtomicBool,
    rlm_available: std::sync::atomic::AtomicBool,
    temporal_available: std::sync::atomic::AtomicBool,
    failure_count: std::sync::atomic::AtomicU32,
}

impl Default for InfraStatus {
    fn default() -> Self {
        InfraStatus {
            cms_available: std::sync::atomic::AtomicBool::new(true),
            rlm_available: std::sync::atomic::AtomicBool::new(true),
            temporal_available: std::sync::atomic::AtomicBool::new(true),
            failure_count: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl InfraStatus {
    pub fn mark_cms_failed(&self) {
        self.cms_available.store(false, std::sync::atomic::Ordering::SeqCst);
        self.failure_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn mark_cms_available(&self) {
        self.cms_available.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn cms_available(&self) -> bool {
        self.cms_available.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn mark_rlm_failed(&self) {
        self.rlm_available.store(false, std::sync::atomic::Ordering::SeqCst);
        self.failure_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn rlm_available(&self) -> bool {
        self.rlm_available.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn mark_temporal_failed(&self) {
        self.temporal_available.store(false, std::sync::atomic::Ordering::SeqCst);
        self.failure_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn temporal_available(&self) -> bool {
        self.temporal_available.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}
