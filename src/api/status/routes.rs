use crate::api::models::AppState;
use crate::api::status::handlers::{create_status_check_handler, list_status_checks_handler};
use axum::{routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(list_status_checks_handler).post(create_status_check_handler))
}
