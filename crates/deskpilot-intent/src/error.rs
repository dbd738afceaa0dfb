//! Intent crate error types.

/// Unified error type for the intent crate.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// An intent pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
