//! GET /v1/models (§6).

use crate::http::state::SharedState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn list_models(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let by_provider = state.router.list_available_models_by_provider();
    let data: Vec<serde_json::Value> = by_provider
        .into_iter()
        .flat_map(|(provider, models)| {
            models.into_iter().map(move |model| {
                json!({ "id": model, "object": "model", "owned_by": provider.clone() })
            })
        })
        .collect();
    Json(json!({ "data": data }))
}
