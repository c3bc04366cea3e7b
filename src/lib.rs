pub mod circuit_breaker;
pub mod config;
pub mod downstream;
pub mod error;
pub mod fallback_chain;
pub mod http;
pub mod messages;
pub mod model_registry;
pub mod observability;
pub mod orchestrator;
pub mod providers;
pub mod rate_limiter;
pub mod router;
pub mod session;
pub mod tools;
