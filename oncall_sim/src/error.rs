//! Harness error type.

use oncall_core::SimError;
use thiserror::Error;

/// Errors surfaced by the store, the runner and the exporter.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Rejected by the kernel
    #[error(transparent)]
    Sim(#[from] SimError),

    /// `StoreConfig::max_active_sessions` reached
    #[error("Session store full: {0} active sessions")]
    StoreFull(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Sim(e) => e.kind(),
            HarnessError::StoreFull(_) => "store_full",
            HarnessError::Io(_) => "io",
            HarnessError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_passes_through_sim_errors() {
        let err: HarnessError = SimError::not_found("session x").into();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "Not found: session x");
        assert_eq!(HarnessError::StoreFull(3).kind(), "store_full");
    }
}
