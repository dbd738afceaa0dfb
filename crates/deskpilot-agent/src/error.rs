//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.

use serde_json::Value;

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed before a status was seen.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The model call exceeded the client timeout.
    #[error("llm request timed out after {millis} ms")]
    LlmTimeout { millis: u64 },

    /// The provider answered with a non-success status.
    ///
    /// `body` holds the decoded JSON error body, or the raw text wrapped in a
    /// JSON string when the body is not JSON.
    #[error("{status} {reason}")]
    Upstream {
        status: u16,
        reason: String,
        body: Value,
    },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing.
    #[error("{env_var} missing")]
    MissingApiKey { env_var: String },

    // -- Runtime errors ------------------------------------------------------
    /// The loop reached the configured turn cap without a final answer.
    #[error("gave up after {max_turns} model turns")]
    MaxTurnsExceeded { max_turns: u32 },

    /// A tool call referenced by the LLM does not exist in the registry.
    #[error("unknown tool {tool_name}")]
    UnknownTool { tool_name: String },

    /// A tool invocation failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

impl AgentError {
    /// Render this error as the JSON payload returned to HTTP callers.
    ///
    /// Upstream failures carry the provider body alongside the status line.
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Upstream { body, .. } => serde_json::json!({
                "ok": false,
                "error": self.to_string(),
                "body": body,
            }),
            _ => serde_json::json!({
                "ok": false,
                "error": self.to_string(),
            }),
        }
    }
}
