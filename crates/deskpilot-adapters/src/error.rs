//! Adapter error types.
//!
//! All action failures surface through [`AdapterError`].  The variants follow
//! the failure taxonomy the HTTP layer maps onto status codes, so callers can
//! decide how to report a failure without inspecting strings.

/// Unified error type for DeskPilot actions.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The panic flag is set; no action may run.
    #[error("DeskPilot is disabled (panic mode)")]
    Disabled,

    /// A capability is switched off in the `[features]` table.
    #[error("{feature} disabled")]
    FeatureDisabled { feature: String },

    /// The application key is not in the allowlist.
    #[error("{name} not in allowlist")]
    NotAllowed { name: String },

    /// No window title contains the requested substring.
    #[error("window not found")]
    WindowNotFound { title: String },

    /// The allowlisted command's executable is not on `PATH`.
    #[error("not found: {exe}")]
    ExecutableNotFound { exe: String },

    /// A required argument is missing or empty.
    #[error("{reason}")]
    Validation { reason: String },

    /// An OS command or browser operation failed.
    #[error("{operation} failed: {reason}")]
    ExecutionFailed { operation: String, reason: String },

    /// An operation exceeded its time limit.
    #[error("timed out after {millis} ms: {reason}")]
    Timeout { millis: u64, reason: String },

    /// An I/O operation failed.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AdapterError {
    /// Shorthand for a [`AdapterError::Validation`] error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`AdapterError::ExecutionFailed`] error.
    pub fn failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
