//! Process entrypoint: loads configuration and the model registry, constructs every
//! loaded provider adapter, wires the shared state, and serves the HTTP surface.

use llm_gateway::circuit_breaker::CircuitBreakerRegistry;
use llm_gateway::config::GatewayConfig;
use llm_gateway::downstream::{AiAgentsBackend, AiAgentsClient, CmsClient, SemanticSearchClient};
use llm_gateway::fallback_chain::{FallbackChain, LocalCacheBackend};
use llm_gateway::http::{build_router, GatewayState};
use llm_gateway::messages::ToolDefinition;
use llm_gateway::model_registry::ModelRegistry;
use llm_gateway::observability::{InfraStatus, NoopMetricsSink};
use llm_gateway::orchestrator::{ChatOrchestrator, OrchestratorConfig};
use llm_gateway::providers::anthropic::AnthropicAdapter;
use llm_gateway::providers::openai::OpenAiAdapter;
use llm_gateway::providers::ProviderAdapter;
use llm_gateway::rate_limiter::RateLimiter;
use llm_gateway::router::ProviderRouter;
use llm_gateway::session::{InMemorySessionStore, SessionManager, SessionStore};
use llm_gateway::tools::proxies::{AiAgentsTool, SemanticSearchTool};
use llm_gateway::tools::{RegisteredTool, ToolRegistry};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = GatewayConfig::from_env();
    config.init_logging();
    llm_gateway::providers::common::configure_pool(
        config.http_max_connections,
        config.http_max_keepalive,
        config.http_timeout_seconds,
    );

    let registry = ModelRegistry::load_from_path(&config.model_registry_path);

    let mut loaded: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
    if let Some(api_key) = config.provider_api_key("openai") {
        let models = registry
            .registered_models
            .iter()
            .filter(|(_, provider)| provider.as_str() == "openai")
            .map(|(model, _)| model.clone())
            .collect();
        loaded.insert(
            "openai".to_string(),
            Arc::new(OpenAiAdapter::new(
                "openai",
                "https://api.openai.com/v1",
                api_key,
                models,
                config.retry_count,
            )),
        );
    }
    if let Some(api_key) = config.provider_api_key("anthropic") {
        let models = registry
            .registered_models
            .iter()
            .filter(|(_, provider)| provider.as_str() == "anthropic")
            .map(|(model, _)| model.clone())
            .collect();
        loaded.insert(
            "anthropic".to_string(),
            Arc::new(AnthropicAdapter::new(
                "anthropic",
                "https://api.anthropic.com/v1",
                api_key,
                models,
                config.retry_count,
            )),
        );
    }
    if let Some(inference_url) = config.inference_service_url.clone() {
        let models = registry
            .registered_models
            .iter()
            .filter(|(_, provider)| provider.as_str() == "local")
            .map(|(model, _)| model.clone())
            .collect();
        loaded.insert(
            "local".to_string(),
            Arc::new(OpenAiAdapter::new("local", inference_url, "", models, config.retry_count)),
        );
    }

    if loaded.is_empty() {
        log::warn!("no provider API keys configured; the gateway is starting with zero loaded providers");
    }

    let router = Arc::new(ProviderRouter::new(registry, loaded));

    let metrics = Arc::new(NoopMetricsSink);
    let circuit_breakers = Arc::new(CircuitBreakerRegistry::new(
        config.circuit_failure_threshold,
        config.circuit_recovery_timeout,
        config.circuit_half_open_max,
        metrics.clone(),
    ));

    let session_store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let sessions = Arc::new(SessionManager::new(session_store, config.session_ttl_seconds));

    let tools = Arc::new(ToolRegistry::new());
    let tool_executor = Arc::new(llm_gateway::tools::ToolExecutor::new(tools.clone(), config.tool_execution_timeout));

    let infra_status = Arc::new(InfraStatus::default());

    let cms = if config.cms_enabled {
        config
            .cms_url
            .clone()
            .map(|url| Arc::new(CmsClient::new(url, Duration::from_secs(config.http_timeout_seconds))))
    } else {
        None
    };

    let semantic_search = config
        .semantic_search_url
        .clone()
        .map(|url| Arc::new(SemanticSearchClient::new(url, Duration::from_secs(config.http_timeout_seconds))));
    let ai_agents = config
        .ai_agents_url
        .clone()
        .map(|url| Arc::new(AiAgentsClient::new(url, Duration::from_secs(config.http_timeout_seconds))));

    if let Some(client) = semantic_search.clone() {
        let breaker = circuit_breakers.get("semantic_search");
        tools.register(RegisteredTool::new(
            ToolDefinition {
                name: "semantic_search".to_string(),
                description: "Searches the semantic index for passages relevant to a query.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string" },
                        "top_k": { "type": "integer" },
                    },
                    "required": ["query"],
                }),
            },
            Arc::new(SemanticSearchTool::new(client, breaker)),
        ));
    }

    if let Some(client) = ai_agents.clone() {
        let breaker = circuit_breakers.get("ai_agents");
        let mut chain = FallbackChain::new("ai_agents", metrics.clone());
        chain.push(Arc::new(AiAgentsBackend::new(client)), breaker);
        chain.push(Arc::new(LocalCacheBackend::default()), circuit_breakers.get("ai_agents_cache"));
        tools.register(RegisteredTool::new(
            ToolDefinition {
                name: "ai_agents".to_string(),
                description: "Invokes a named downstream agent with a JSON input payload.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "agent": { "type": "string" },
                        "input": { "type": "object" },
                    },
                    "required": ["agent"],
                }),
            },
            Arc::new(AiAgentsTool::new(Arc::new(chain))),
        ));
    }

    let orchestrator = Arc::new(ChatOrchestrator::new(
        router.clone(),
        Some(sessions.clone()),
        tool_executor,
        cms.clone(),
        infra_status.clone(),
        OrchestratorConfig { max_tool_iterations: config.max_tool_iterations, cms_proxy_mode: config.cms_enabled },
    ));

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_rpm, config.rate_limit_burst));

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(GatewayState {
        config,
        router,
        orchestrator,
        rate_limiter,
        circuit_breakers,
        sessions,
        tools,
        semantic_search,
        ai_agents,
        cms,
        infra_status,
    });

    let app = build_router(state);

    log::info!("listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("failed to bind address");
    axum::serve(listener, app).await.expect("server error");
}
