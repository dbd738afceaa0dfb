//! Web crate errors and their HTTP mapping.

use std::path::PathBuf;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use deskpilot_adapters::AdapterError;
use deskpilot_agent::AgentError;
use serde_json::json;

/// Startup and configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// The config file could not be read or parsed.
    #[error("config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("intent table: {0}")]
    Intent(#[from] deskpilot_intent::IntentError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the web crate.
pub type Result<T> = std::result::Result<T, WebError>;

/// A failed request.  Rendered as `{ok: false, error, detail}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Adapter(AdapterError::validation(rejection.body_text()))
    }
}

impl ApiError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Adapter(e) => match e {
                AdapterError::Disabled => StatusCode::LOCKED,
                AdapterError::FeatureDisabled { .. } | AdapterError::NotAllowed { .. } => {
                    StatusCode::FORBIDDEN
                }
                AdapterError::WindowNotFound { .. } | AdapterError::ExecutableNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                AdapterError::Validation { .. } => StatusCode::BAD_REQUEST,
                AdapterError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                AdapterError::ExecutionFailed { .. }
                | AdapterError::IoError(_)
                | AdapterError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Agent(e) => match e {
                AgentError::MissingApiKey { .. } => StatusCode::SERVICE_UNAVAILABLE,
                AgentError::MaxTurnsExceeded { .. } | AgentError::LlmTimeout { .. } => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                AgentError::Upstream { .. }
                | AgentError::LlmRequestFailed { .. }
                | AgentError::LlmParseFailed { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let body = match &self {
            Self::Agent(e) => {
                let mut payload = e.to_payload();
                payload["detail"] = json!(message);
                payload
            }
            _ => json!({"ok": false, "error": message, "detail": message}),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
