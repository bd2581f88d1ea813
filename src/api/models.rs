use crate::archive::{ArchiveError, ArchiveFilter};
use crate::storage::{Database, StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Database>,
    pub archive: Arc<ArchiveSettings>,
}

/// Where and how the project archive is built
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub root: PathBuf,
    pub file_name: String,
    pub filter: ArchiveFilter,
}

/// Request to record a status check
#[derive(Debug, Deserialize)]
pub struct StatusCheckCreate {
    pub client_name: String,
}

/// Request to add a new review
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCreate {
    pub app_id: String,
    pub user_name: String,
    pub rating: i64,
    pub comment: String,
}

/// Response to a helpful vote
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
}

/// Greeting returned by the API root
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub total_reviews: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ReviewCreate {
    /// Validate the request, returning the rating as stored
    pub fn validate(&self) -> Result<u8, String> {
        match u8::try_from(self.rating) {
            Ok(rating @ 1..=5) => Ok(rating),
            _ => Err("Review rating must be between 1 and 5".to_string()),
        }
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(format!("Store operation failed: {err}"))
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        AppError::Internal(format!("Archive build failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse {
            error: status.to_string(),
            message,
        }))
        .into_response()
    }
}
