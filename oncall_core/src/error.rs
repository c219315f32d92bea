//! Error types for the simulation kernel.

use thiserror::Error;

/// Errors reported synchronously by session operations.
///
/// None of these are transient: the kernel performs no I/O, so a caller that
/// retries the same request gets the same answer. Every operation validates
/// before it mutates, so an error leaves the session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Unknown session or patient id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed action, unsupported action type or missing required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not permitted in the session's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SimError {
    /// Creates a not-found error.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Creates a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Short machine-readable name of the error kind, for API mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::NotFound(_) => "not_found",
            SimError::Validation(_) => "validation",
            SimError::InvalidState(_) => "invalid_state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::not_found("patient pt_404");
        assert_eq!(err.to_string(), "Not found: patient pt_404");
        assert_eq!(err.kind(), "not_found");

        let err = SimError::validation("unknown action type 'dance'");
        assert_eq!(err.kind(), "validation");

        let err = SimError::invalid_state("session already complete");
        assert_eq!(err.to_string(), "Invalid state: session already complete");
    }
}
