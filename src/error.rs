//! Error taxonomy shared across the gateway.
//!
//! Every module boundary in this crate converges on [`GatewayError`]; adapters and
//! downstream clients that work in terms of `Box<dyn std::error::Error>` are wrapped
//! into the closest matching variant at the seam rather than left opaque.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("upstream authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("no provider registered for model '{0}'")]
    NoProvider(String),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session store unreachable: {0}")]
    SessionStore(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("tool arguments failed validation: {0}")]
    ToolValidation(String),

    #[error("unknown tool '{0}'")]
    ToolNotFound(String),

    #[error("circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("all fallback backends exhausted for '{0}'")]
    FallbackExhausted(String),
}

impl GatewayError {
    /// Stable HTTP status mapping used at the handler boundary.
    ///
    /// `NoProvider` maps to 400 rather than 404: an unroutable model name is a
    /// malformed request, kept distinct from "resource id not found".
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Authentication(_) => StatusCode::BAD_GATEWAY,
            GatewayError::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Provider(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NoProvider(_) => StatusCode::BAD_REQUEST,
            GatewayError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::SessionStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ToolExecution(_) => StatusCode::OK,
            GatewayError::ToolValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::FallbackExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = serde_json::json!({ "detail": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
