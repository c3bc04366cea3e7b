//! GET /v1/tools, POST /v1/tools/execute (§6).

use crate::error::GatewayError;
use crate::http::state::SharedState;
use crate::messages::{ToolCall, ToolCallFunction};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn list_tools(State(state): State<SharedState>) -> Json<Vec<crate::messages::ToolDefinition>> {
    Json(state.tools.list())
}

#[derive(Debug, Deserialize)]
pub struct ExecuteToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

pub async fn execute_tool(
    State(state): State<SharedState>,
    Json(request): Json<ExecuteToolRequest>,
) -> Response {
    let Some(tool) = state.tools.get(&request.name) else {
        return GatewayError::ToolNotFound(request.name.clone()).into_response();
    };

    if let Err(msg) = tool.validate(&request.arguments) {
        return GatewayError::ToolValidation(msg).into_response();
    }

    let call = ToolCall {
        id: "direct".to_string(),
        call_type: "function".to_string(),
        function: ToolCallFunction { name: request.name.clone(), arguments: request.arguments.to_string() },
    };

    let executor = crate::tools::ToolExecutor::new(state.tools.clone(), state.config.tool_execution_timeout);
    let result = executor.execute(&call).await;
    Json(json!({ "content": result.content, "is_error": result.is_error })).into_response()
}
