pub mod download;
pub mod models;
pub mod review;
pub mod status;

// Re-exports
pub use models::*;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::warn;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Every endpoint, nested under `/api`
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(status::routes())
        .merge(review::routes())
        .merge(download::routes());

    Router::new().nest("/api", api).with_state(state)
}

/// CORS policy for the configured origins, `*` meaning any
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let list = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {o}"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(list)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello World".to_string(),
    })
}

// Health handler (simple, keep here)
pub async fn health_handler(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let (code, status, total_reviews) = match state.store.reviews.count().await {
        Ok(total) => (StatusCode::OK, "healthy", total),
        Err(e) => {
            warn!(error = %e, "Health check could not reach the store");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable", 0)
        }
    };

    (code, Json(models::HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_reviews,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveFilter;
    use crate::config::ArchiveConfig;
    use crate::storage::{Database, Review, StatusCheck};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        store: Arc<Database>,
        project: TempDir,
        _data: TempDir,
    }

    async fn test_app() -> TestApp {
        let project = tempfile::tempdir().unwrap();
        let root = project.path().to_path_buf();
        test_app_with_root(project, root).await
    }

    async fn test_app_with_root(project: TempDir, root: std::path::PathBuf) -> TestApp {
        let data = tempfile::tempdir().unwrap();
        let store = Arc::new(Database::open(data.path()).await.unwrap());
        let state = AppState {
            store: store.clone(),
            archive: Arc::new(ArchiveSettings {
                root,
                file_name: "project.tar.gz".to_string(),
                filter: ArchiveFilter::from_config(&ArchiveConfig::default()),
            }),
        };
        TestApp {
            app: router(state),
            store,
            project,
            _data: data,
        }
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, T) {
        let (status, bytes) = send(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn create_review(app: &Router, app_id: &str, user: &str, rating: i64) -> Review {
        let body = json!({ "appId": app_id, "userName": user, "rating": rating, "comment": "Bien" });
        let (status, review) = send_json(app, Method::POST, "/api/reviews", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        review
    }

    async fn list_reviews(app: &Router, app_id: &str) -> Vec<Review> {
        let (status, reviews) = send_json(app, Method::GET, &format!("/api/reviews/{app_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        reviews
    }

    #[tokio::test]
    async fn root_and_health() {
        let t = test_app().await;

        let (status, body): (_, Value) = send_json(&t.app, Method::GET, "/api", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hello World");

        create_review(&t.app, "netflix", "Thomas", 5).await;
        let (status, body): (_, Value) = send_json(&t.app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["total_reviews"], 1);
    }

    #[tokio::test]
    async fn health_reports_unavailable_store() {
        let t = test_app().await;
        t.store.close().await;

        let (status, body): (_, Value) = send_json(&t.app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
    }

    #[tokio::test]
    async fn status_checks_round_trip() {
        let t = test_app().await;

        let (status, created): (_, StatusCheck) = send_json(
            &t.app,
            Method::POST,
            "/api/status",
            Some(json!({ "client_name": "frontend" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created.client_name, "frontend");

        let (status, listed): (_, Vec<StatusCheck>) =
            send_json(&t.app, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn status_check_requires_client_name() {
        let t = test_app().await;
        let (status, _) = send(&t.app, Method::POST, "/api/status", Some(json!({}))).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn create_review_accepts_valid_ratings() {
        let t = test_app().await;

        for rating in 1..=5 {
            let review = create_review(&t.app, "netflix", "  jean pierre  ", rating).await;
            assert_eq!(i64::from(review.rating), rating);
            assert_eq!(review.user_name, "jean pierre");
            assert_eq!(review.user_initials, "JP");
            assert_eq!(review.comment, "Bien");
            assert_eq!(review.helpful, 0);
        }
    }

    #[tokio::test]
    async fn create_review_rejects_out_of_range_ratings() {
        let t = test_app().await;

        for rating in [0, 6, -1] {
            let body = json!({ "appId": "netflix", "userName": "Marie", "rating": rating, "comment": "x" });
            let (status, error): (_, Value) =
                send_json(&t.app, Method::POST, "/api/reviews", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "rating {rating}");
            assert!(error["message"].as_str().unwrap().contains("between 1 and 5"));
        }

        assert_eq!(t.store.reviews.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reviews_are_isolated_per_app() {
        let t = test_app().await;

        for i in 0..3 {
            create_review(&t.app, "netflix", &format!("Netflix User{i}"), 4).await;
        }
        for i in 0..2 {
            create_review(&t.app, "spotify", &format!("Spotify User{i}"), 3).await;
        }

        let netflix = list_reviews(&t.app, "netflix").await;
        let spotify = list_reviews(&t.app, "spotify").await;

        assert_eq!(netflix.len(), 3);
        assert_eq!(spotify.len(), 2);
        assert!(netflix.iter().all(|r| r.app_id == "netflix"));
        assert!(spotify.iter().all(|r| r.app_id == "spotify"));
        // Same day, so the latest submission comes first
        assert_eq!(netflix[0].user_name, "Netflix User2");
    }

    #[tokio::test]
    async fn unknown_app_has_no_reviews() {
        let t = test_app().await;
        assert!(list_reviews(&t.app, "disney-plus").await.is_empty());
    }

    #[tokio::test]
    async fn list_reviews_is_fail_soft() {
        let t = test_app().await;
        create_review(&t.app, "netflix", "Thomas", 5).await;

        t.store.close().await;

        assert!(list_reviews(&t.app, "netflix").await.is_empty());
    }

    #[tokio::test]
    async fn writes_fail_when_store_is_closed() {
        let t = test_app().await;
        t.store.close().await;

        let body = json!({ "appId": "netflix", "userName": "Thomas", "rating": 5, "comment": "x" });
        let (status, _) = send(&t.app, Method::POST, "/api/reviews", Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = send(&t.app, Method::PUT, "/api/reviews/netflix/abc/helpful", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn helpful_vote_increments_by_one() {
        let t = test_app().await;
        let review = create_review(&t.app, "netflix", "Marie Dubois", 4).await;
        let uri = format!("/api/reviews/netflix/{}/helpful", review.id);

        for expected in 1..=3 {
            let (status, vote): (_, VoteResponse) = send_json(&t.app, Method::PUT, &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert!(vote.success);
            assert_eq!(list_reviews(&t.app, "netflix").await[0].helpful, expected);
        }
    }

    #[tokio::test]
    async fn helpful_vote_on_missing_review() {
        let t = test_app().await;
        let review = create_review(&t.app, "netflix", "Marie Dubois", 4).await;

        // Right id, wrong app
        let uri = format!("/api/reviews/spotify/{}/helpful", review.id);
        let (status, vote): (_, VoteResponse) = send_json(&t.app, Method::PUT, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!vote.success);
        assert_eq!(vote.message, "Review not found");

        let (_, vote): (_, VoteResponse) =
            send_json(&t.app, Method::PUT, "/api/reviews/netflix/missing/helpful", None).await;
        assert!(!vote.success);

        assert_eq!(list_reviews(&t.app, "netflix").await[0].helpful, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_helpful_votes_are_all_counted() {
        let t = test_app().await;
        let review = create_review(&t.app, "netflix", "Marie Dubois", 4).await;
        let uri = format!("/api/reviews/netflix/{}/helpful", review.id);

        let votes: Vec<_> = (0..25)
            .map(|_| {
                let app = t.app.clone();
                let uri = uri.clone();
                tokio::spawn(async move { send(&app, Method::PUT, &uri, None).await.0 })
            })
            .collect();
        for vote in votes {
            assert_eq!(vote.await.unwrap(), StatusCode::OK);
        }

        assert_eq!(list_reviews(&t.app, "netflix").await[0].helpful, 25);
    }

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, relative).unwrap();
    }

    #[tokio::test]
    async fn download_project_returns_filtered_archive() {
        let t = test_app().await;
        write(t.project.path(), "backend/server.py");
        write(t.project.path(), "frontend/node_modules/x/index.js");
        write(t.project.path(), "backend/app.log");

        let request = Request::builder()
            .uri("/api/download-project")
            .body(Body::empty())
            .unwrap();
        let response = t.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/gzip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"project.tar.gz\""
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(&bytes[..]));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["backend/server.py"]);
    }

    #[tokio::test]
    async fn download_project_fails_without_partial_archive() {
        let project = tempfile::tempdir().unwrap();
        let missing = project.path().join("gone");
        let t = test_app_with_root(project, missing).await;

        let request = Request::builder()
            .uri("/api/download-project")
            .body(Body::empty())
            .unwrap();
        let response = t.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "500 Internal Server Error");
        assert!(body["message"].as_str().unwrap().starts_with("Archive build failed"));
    }

    #[test]
    fn cors_rejects_invalid_origin() {
        assert!(cors_layer(&["*".to_string()]).is_ok());
        assert!(cors_layer(&["https://app.example".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
