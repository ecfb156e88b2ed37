use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{info, instrument, warn};

use crate::shared::{AppError, AppState};

/// Validates the `Authorization: Bearer` operator token and adds
/// [`super::OperatorClaims`] to the request extensions.
#[instrument(skip(state, req, next), fields(uri = %req.uri()))]
pub async fn operator_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header in request");
            AppError::Unauthorized("Missing authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Invalid Authorization header format (expected Bearer token)");
        AppError::Unauthorized("Invalid authorization header format".to_string())
    })?;

    let claims = match state.token_config.validate_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Operator authentication failed: {}", e);
            return Err(e);
        }
    };

    info!(operator = %claims.sub, "Operator authenticated");
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
