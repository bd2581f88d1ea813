use crate::api::download::handlers::download_project_handler;
use crate::api::models::AppState;
use axum::{routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/download-project", get(download_project_handler))
}
