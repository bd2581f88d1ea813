use crate::api::models::*;
use crate::archive::build_project_archive;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::info;

pub async fn download_project_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let settings = state.archive.clone();

    info!(root = %settings.root.display(), "Building project archive");

    let bytes = tokio::task::spawn_blocking(move || {
        build_project_archive(&settings.root, &settings.filter)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Archive task failed: {}", e)))??;

    let disposition = format!("attachment; filename=\"{}\"", state.archive.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
