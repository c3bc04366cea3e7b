//! Axum HTTP surface (§6): routes, shared state, and the correlation-id / rate-limit
//! middleware every request passes through.

pub mod handlers;
pub mod middleware;
pub mod sse;
pub mod state;

pub use state::{GatewayState, SharedState};

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::chat::chat_completions))
        .route(
            "/v1/sessions",
            post(handlers::sessions::create_session),
        )
        .route(
            "/v1/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route("/v1/models", get(handlers::models::list_models))
        .route("/v1/tools", get(handlers::tools::list_tools))
        .route("/v1/tools/execute", post(handlers::tools::execute_tool))
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::health::metrics))
        .layer(axum_middleware::from_fn(middleware::correlation_id))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
