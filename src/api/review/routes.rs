use crate::api::models::AppState;
use crate::api::review::handlers::{
    create_review_handler, list_reviews_handler, vote_helpful_handler,
};
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", post(create_review_handler))
        .route("/reviews/{app_id}", get(list_reviews_handler))
        .route("/reviews/{app_id}/{review_id}/helpful", put(vote_helpful_handler))
}
