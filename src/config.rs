//! Process-wide configuration, loaded once from environment variables under the
//! `LLM_GATEWAY_` prefix. Kept as a plain struct with a hand-rolled loader rather than
//! a declarative settings framework, in the spirit of the small `Default`-driven config
//! struct this crate's provider layer was built from.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub env: String,
    pub log_level: String,
    pub default_provider: Option<String>,
    pub session_ttl_seconds: u64,
    pub semantic_search_url: Option<String>,
    pub ai_agents_url: Option<String>,
    pub cms_url: Option<String>,
    pub cms_enabled: bool,
    pub inference_service_url: Option<String>,
    pub rate_limit_rpm: f64,
    pub rate_limit_burst: f64,
    pub http_max_connections: usize,
    pub http_max_keepalive: usize,
    pub http_timeout_seconds: u64,
    pub retry_count: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_recovery_timeout: Duration,
    pub circuit_half_open_max: u32,
    pub max_tool_iterations: u32,
    pub tool_execution_timeout: Duration,
    pub model_registry_path: String,
    pub bind_addr: String,
}

const ENV_PREFIX: &str = "LLM_GATEWAY_";

fn var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            env: var("ENV").unwrap_or_else(|| "development".to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            default_provider: var("DEFAULT_PROVIDER"),
            session_ttl_seconds: var_or("SESSION_TTL_SECONDS", 3600),
            semantic_search_url: var("SEMANTIC_SEARCH_URL"),
            ai_agents_url: var("AI_AGENTS_URL"),
            cms_url: var("CMS_URL"),
            cms_enabled: var_or("CMS_ENABLED", false),
            inference_service_url: var("INFERENCE_SERVICE_URL"),
            rate_limit_rpm: var_or("RATE_LIMIT_RPM", 60.0),
            rate_limit_burst: var_or("RATE_LIMIT_BURST", 10.0),
            http_max_connections: var_or("HTTP_MAX_CONNECTIONS", 100),
            http_max_keepalive: var_or("HTTP_MAX_KEEPALIVE", 10),
            http_timeout_seconds: var_or("HTTP_TIMEOUT_SECONDS", 30),
            retry_count: var_or("RETRY_COUNT", 3),
            circuit_failure_threshold: var_or("CIRCUIT_FAILURE_THRESHOLD", 5),
            circuit_recovery_timeout: Duration::from_secs(var_or("CIRCUIT_RECOVERY_TIMEOUT", 30)),
            circuit_half_open_max: var_or("CIRCUIT_HALF_OPEN_MAX", 1),
            max_tool_iterations: var_or("MAX_TOOL_ITERATIONS", 10),
            tool_execution_timeout: Duration::from_secs(var_or("TOOL_EXECUTION_TIMEOUT", 30)),
            model_registry_path: var("MODEL_REGISTRY_PATH")
                .unwrap_or_else(|| "model_registry.yaml".to_string()),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// API key for a named provider, e.g. `provider_api_key("openai")` reads
    /// `LLM_GATEWAY_OPENAI_API_KEY`. Absence means the provider is not loaded.
    pub fn provider_api_key(&self, provider: &str) -> Option<String> {
        var(&format!("{}_API_KEY", provider.to_uppercase()))
    }

    pub fn init_logging(&self) {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", &self.log_level);
        }
        let _ = env_logger::try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = GatewayConfig {
            env: "test".into(),
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.rate_limit_burst, 10.0);
        assert_eq!(cfg.max_tool_iterations, 10);
        assert!(cfg.tool_execution_timeout.as_secs() == 30);
    }

    #[test]
    fn provider_api_key_reads_prefixed_env_var() {
        std::env::set_var("LLM_GATEWAY_OPENAI_API_KEY", "sk-test");
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.provider_api_key("openai"), Some("sk-test".to_string()));
        std::env::remove_var("LLM_GATEWAY_OPENAI_API_KEY");
    }
}
