use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::operator::TokenConfig;
use crate::pbis::{CollectionOrchestrator, PbisError};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CollectionOrchestrator>,
    pub token_config: TokenConfig,
}

impl AppState {
    pub fn new(orchestrator: Arc<CollectionOrchestrator>, token_config: TokenConfig) -> Self {
        Self {
            orchestrator,
            token_config,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal,
}

impl From<PbisError> for AppError {
    fn from(err: PbisError) -> Self {
        match err {
            PbisError::Forbidden(msg) => AppError::Forbidden(msg),
            PbisError::InvalidTransition { .. }
            | PbisError::StalePreview(_)
            | PbisError::RunInFlight => {
                AppError::Conflict(err.to_string())
            }
            PbisError::Backend(_) | PbisError::Persistence(_) => AppError::Upstream(err.to_string()),
            PbisError::Config(_) | PbisError::Serialization(_) => {
                tracing::error!(%err, "Internal PBIS error");
                AppError::Internal
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::JwtError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
