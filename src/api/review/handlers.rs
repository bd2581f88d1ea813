use crate::api::models::*;
use crate::storage::Review;
use axum::{
    extract::{Path, State},
    Json,
};
use std::cmp::Reverse;
use tracing::{debug, info, warn};

const MAX_REVIEWS: usize = 1000;

/// List the reviews of one app, most recent first.
///
/// Reads are fail-soft: a store failure is logged and answered with an empty
/// list, the same shape as an app nobody has reviewed yet.
pub async fn list_reviews_handler(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> Json<Vec<Review>> {
    let reviews = match state.store.reviews.find(|r| r.app_id == app_id, None).await {
        Ok(reviews) => reviews,
        Err(e) => {
            warn!(app_id = %app_id, error = %e, "Review lookup failed, serving empty list");
            return Json(Vec::new());
        }
    };

    if reviews.is_empty() {
        debug!(app_id = %app_id, "No reviews yet");
    }

    Json(newest_first(reviews))
}

/// Sort by calendar date descending; same-day reviews keep the latest
/// insertion first and undated ones go last.
fn newest_first(mut reviews: Vec<Review>) -> Vec<Review> {
    reviews.reverse();
    reviews.sort_by_key(|r| Reverse(r.calendar_date()));
    reviews.truncate(MAX_REVIEWS);
    reviews
}

pub async fn create_review_handler(
    State(state): State<AppState>,
    Json(request): Json<ReviewCreate>,
) -> Result<Json<Review>, AppError> {
    // Validate
    let rating = request.validate().map_err(AppError::BadRequest)?;

    let review = Review::new(
        request.app_id,
        &request.user_name,
        rating,
        &request.comment,
        chrono::Local::now().date_naive(),
    );
    state.store.reviews.insert(review.clone()).await?;

    info!(review_id = %review.id, app_id = %review.app_id, rating, "Review created");

    Ok(Json(review))
}

pub async fn vote_helpful_handler(
    State(state): State<AppState>,
    Path((app_id, review_id)): Path<(String, String)>,
) -> Result<Json<VoteResponse>, AppError> {
    let updated = state
        .store
        .reviews
        .update_one(
            |r| r.id == review_id && r.app_id == app_id,
            |r| r.helpful += 1,
        )
        .await?;

    let response = match updated {
        Some(review) => {
            info!(review_id = %review_id, helpful = review.helpful, "Helpful vote added");
            VoteResponse {
                success: true,
                message: "Vote added".to_string(),
            }
        }
        None => {
            warn!(app_id = %app_id, review_id = %review_id, "Review not found");
            VoteResponse {
                success: false,
                message: "Review not found".to_string(),
            }
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn review_on(user: &str, d: u32, m: u32, y: i32) -> Review {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        Review::new("netflix".to_string(), user, 4, "", date)
    }

    #[test]
    fn newest_first_orders_by_calendar_date() {
        // Lexical order of dd/mm/YYYY would put 31/01 before 02/12
        let reviews = vec![
            review_on("Old", 31, 1, 2024),
            review_on("New", 2, 12, 2024),
            review_on("Mid", 15, 6, 2024),
        ];

        let names: Vec<_> = newest_first(reviews).into_iter().map(|r| r.user_name).collect();
        assert_eq!(names, vec!["New", "Mid", "Old"]);
    }

    #[test]
    fn newest_first_breaks_ties_by_insertion() {
        let mut undated = review_on("Undated", 1, 1, 2025);
        undated.date = "someday".to_string();
        let reviews = vec![
            review_on("First", 1, 1, 2025),
            undated,
            review_on("Second", 1, 1, 2025),
        ];

        let names: Vec<_> = newest_first(reviews).into_iter().map(|r| r.user_name).collect();
        assert_eq!(names, vec!["Second", "First", "Undated"]);
    }

    #[test]
    fn newest_first_caps_results() {
        let reviews = (0..MAX_REVIEWS + 5).map(|_| review_on("A", 1, 1, 2025)).collect();
        assert_eq!(newest_first(reviews).len(), MAX_REVIEWS);
    }
}
