pub mod jsonl;
pub mod records;

pub use jsonl::JsonlCollection;
pub use records::{Review, StatusCheck};

use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt document in {collection} at line {line}: {source}")]
    Corrupt {
        collection: &'static str,
        line: usize,
        source: serde_json::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store is closed")]
    Closed,
}

/// Process-wide handle to the document store
pub struct Database {
    pub status_checks: JsonlCollection<StatusCheck>,
    pub reviews: JsonlCollection<Review>,
}

impl Database {
    pub async fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let status_checks =
            JsonlCollection::open("status_checks", data_dir.join("status_checks.jsonl")).await?;
        let reviews = JsonlCollection::open("reviews", data_dir.join("reviews.jsonl")).await?;

        info!(data_dir = %data_dir.display(), "Document store ready");

        Ok(Self {
            status_checks,
            reviews,
        })
    }

    pub async fn close(&self) {
        self.status_checks.close().await;
        self.reviews.close().await;
        info!("Document store closed");
    }
}
