//! Shared application state handed to every handler (§5).

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::config::GatewayConfig;
use crate::downstream::{AiAgentsClient, CmsClient, SemanticSearchClient};
use crate::observability::InfraStatus;
use crate::orchestrator::ChatOrchestrator;
use crate::rate_limiter::RateLimiter;
use crate::router::ProviderRouter;
use crate::session::SessionManager;
use crate::tools::ToolRegistry;
use std::sync::Arc;

pub struct GatewayState {
    pub config: GatewayConfig,
    pub router: Arc<ProviderRouter>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub circuit_breakers: Arc<CircuitBreakerRegistry>,
    pub sessions: Arc<SessionManager>,
    pub tools: Arc<ToolRegistry>,
    pub semantic_search: Option<Arc<SemanticSearchClient>>,
    pub ai_agents: Option<Arc<AiAgentsClient>>,
    pub cms: Option<Arc<CmsClient>>,
    pub infra_status: Arc<InfraStatus>,
}

pub type SharedState = Arc<GatewayState>;
