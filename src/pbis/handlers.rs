use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::email::EmailReport;
use crate::operator::{operator_auth, OperatorClaims};
use crate::shared::{AppError, AppState};

use super::models::CollectionPreview;
use super::orchestrator::{
    CollectionForm, ConfirmOptions, ConfirmOutcome, RunStatus, StaffDrawOutcome,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    /// Id of the preview the operator reviewed
    pub preview_id: String,
    pub confirmation: String,
    #[serde(flatten)]
    pub options: ConfirmOptions,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDrawRequest {
    pub confirmation: String,
    /// Falls back to the configured staff winner count
    #[serde(default)]
    pub number_of_winners: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WinnerEmailRequest {
    pub email_guardians: bool,
}

/// Every PBIS route, behind the operator token check
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/pbis/collection/open", post(open_collection))
        .route("/pbis/collection/preview", post(preview_collection))
        .route("/pbis/collection/confirm", post(confirm_collection))
        .route("/pbis/collection/close", post(close_collection))
        .route("/pbis/collection/state", get(collection_state))
        .route("/pbis/staff-winners", post(draw_staff_winners))
        .route("/pbis/winner-emails", post(send_winner_emails))
        .layer(middleware::from_fn_with_state(state.clone(), operator_auth))
        .with_state(state)
}

/// POST /pbis/collection/open
pub async fn open_collection(
    State(state): State<AppState>,
    Extension(claims): Extension<OperatorClaims>,
) -> Result<Json<CollectionForm>, AppError> {
    let form = state.orchestrator.open_form(&claims).await?;
    Ok(Json(form))
}

/// POST /pbis/collection/preview
pub async fn preview_collection(
    State(state): State<AppState>,
    Extension(claims): Extension<OperatorClaims>,
) -> Result<Json<CollectionPreview>, AppError> {
    let preview = state.orchestrator.preview(&claims).await?;
    Ok(Json(preview))
}

/// POST /pbis/collection/confirm
///
/// A confirmation that does not match the token answers `not_confirmed` with 200.
pub async fn confirm_collection(
    State(state): State<AppState>,
    Extension(claims): Extension<OperatorClaims>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, AppError> {
    info!(
        operator = %claims.sub,
        send_emails = request.options.send_emails,
        "Collection confirmation submitted"
    );
    let outcome = state
        .orchestrator
        .confirm(
            &claims,
            &request.preview_id,
            &request.confirmation,
            &request.options,
        )
        .await?;
    Ok(Json(outcome))
}

/// POST /pbis/collection/close
pub async fn close_collection(
    State(state): State<AppState>,
    Extension(claims): Extension<OperatorClaims>,
) -> Result<Json<RunStatus>, AppError> {
    info!(operator = %claims.sub, "Closing collection form");
    state.orchestrator.close(&claims).await?;
    Ok(Json(state.orchestrator.status().await))
}

/// GET /pbis/collection/state
pub async fn collection_state(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.orchestrator.status().await)
}

/// POST /pbis/staff-winners
pub async fn draw_staff_winners(
    State(state): State<AppState>,
    Extension(claims): Extension<OperatorClaims>,
    Json(request): Json<StaffDrawRequest>,
) -> Result<Json<StaffDrawOutcome>, AppError> {
    let outcome = state
        .orchestrator
        .draw_staff_winners(
            &claims,
            &request.confirmation,
            request.number_of_winners,
        )
        .await?;
    Ok(Json(outcome))
}

/// POST /pbis/winner-emails
pub async fn send_winner_emails(
    State(state): State<AppState>,
    Extension(claims): Extension<OperatorClaims>,
    Json(request): Json<WinnerEmailRequest>,
) -> Result<Json<EmailReport>, AppError> {
    let report = state
        .orchestrator
        .send_winner_emails(&claims, request.email_guardians)
        .await?;
    Ok(Json(report))
}
