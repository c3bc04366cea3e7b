//! GET /health, /health/ready, /metrics (§6).

use crate::http::state::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn readiness(State(state): State<SharedState>) -> Response {
    match state.sessions.create(None).await {
        Ok(session) => {
            let _ = state.sessions.delete(&session.id).await;
            Json(json!({ "status": "ready" })).into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not_ready", "detail": e.to_string() }))).into_response(),
    }
}

pub async fn metrics(State(state): State<SharedState>) -> String {
    format!(
        "gateway_infra_failure_count {}\ngateway_cms_available {}\ngateway_rlm_available {}\ngateway_temporal_available {}\n",
        state.infra_status.failure_count(),
        state.infra_status.cms_available() as u8,
        state.infra_status.rlm_available() as u8,
        state.infra_status.temporal_available() as u8,
    )
}
