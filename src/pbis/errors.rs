use thiserror::Error;

use super::orchestrator::CollectionState;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PbisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to persist collection: {0}")]
    Persistence(String),

    #[error("Cannot {action} while collection is {state}")]
    InvalidTransition {
        action: &'static str,
        state: CollectionState,
    },

    #[error("Preview {0} is no longer current, review the latest preview before confirming")]
    StalePreview(String),

    #[error("A collection run is already in flight")]
    RunInFlight,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PbisError {
    fn from(err: serde_json::Error) -> Self {
        PbisError::Serialization(err.to_string())
    }
}
