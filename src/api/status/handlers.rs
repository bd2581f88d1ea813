use crate::api::models::*;
use crate::storage::StatusCheck;
use axum::{extract::State, Json};
use tracing::info;

const MAX_STATUS_CHECKS: usize = 1000;

pub async fn create_status_check_handler(
    State(state): State<AppState>,
    Json(request): Json<StatusCheckCreate>,
) -> Result<Json<StatusCheck>, AppError> {
    let check = StatusCheck::new(request.client_name);
    state.store.status_checks.insert(check.clone()).await?;

    info!(id = %check.id, client = %check.client_name, "Status check recorded");

    Ok(Json(check))
}

pub async fn list_status_checks_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusCheck>>, AppError> {
    let checks = state
        .store
        .status_checks
        .find(|_| true, Some(MAX_STATUS_CHECKS))
        .await?;

    Ok(Json(checks))
}
