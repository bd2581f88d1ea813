use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Date format used for the `date` field of reviews
pub const REVIEW_DATE_FORMAT: &str = "%d/%m/%Y";

/// A client health-check record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub id: String,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusCheck {
    pub fn new(client_name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            client_name,
            timestamp: Utc::now(),
        }
    }
}

/// A user review of one subscription/app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub app_id: String,
    pub user_name: String,
    pub rating: u8,
    pub comment: String,
    pub date: String,
    pub helpful: u64,
    pub user_initials: String,
}

impl Review {
    /// Build a fresh review dated `today`. The caller is responsible for
    /// checking the rating range.
    pub fn new(app_id: String, user_name: &str, rating: u8, comment: &str, today: NaiveDate) -> Self {
        let user_name = user_name.trim().to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            app_id,
            user_initials: user_initials(&user_name),
            user_name,
            rating,
            comment: comment.trim().to_string(),
            date: today.format(REVIEW_DATE_FORMAT).to_string(),
            helpful: 0,
        }
    }

    /// Calendar value of `date`, `None` when it does not parse
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, REVIEW_DATE_FORMAT).ok()
    }
}

/// Uppercased first letters of the first two words of `name`
pub fn user_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}
