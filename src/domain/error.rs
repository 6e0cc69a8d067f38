//! Error taxonomy shared by the service layer.

use std::fmt;

/// Errors surfaced by the pipeline, stores and relay.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Malformed input. Never retried.
    Validation(String),
    /// A prerequisite artifact is missing; the message names the missing step.
    NotFound(String),
    /// The per-video question ceiling was reached.
    QuotaExceeded { limit: u32 },
    /// A downstream provider failed or timed out.
    Collaborator(String),
    /// Unexpected failure (store unavailable, serialization, ...).
    Internal(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Validation(msg) => write!(f, "invalid request: {}", msg),
            CoreError::NotFound(msg) => write!(f, "not found: {}", msg),
            CoreError::QuotaExceeded { limit } => {
                write!(f, "question quota exceeded ({} per video)", limit)
            }
            CoreError::Collaborator(msg) => write!(f, "provider error: {}", msg),
            CoreError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}

impl CoreError {
    /// Wrap a provider/port failure with the name of the failing call.
    pub fn collaborator(what: &str, err: impl fmt::Display) -> Self {
        CoreError::Collaborator(format!("{} failed: {}", what, err))
    }

    pub fn internal(what: &str, err: impl fmt::Display) -> Self {
        CoreError::Internal(format!("{}: {}", what, err))
    }
}
