//! Session endpoints (§6): POST/GET/DELETE /v1/sessions.

use crate::http::state::SharedState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub async fn create_session(State(state): State<SharedState>) -> Response {
    match state.sessions.create(None).await {
        Ok(session) => (
            StatusCode::CREATED,
            Json(json!({
                "id": session.id,
                "created_at": session.created_at,
                "expires_at": session.expires_at,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_session(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state.sessions.get(&id).await {
        Ok(session) => Json(session).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_session(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state.sessions.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
