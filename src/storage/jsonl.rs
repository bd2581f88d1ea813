use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::StoreError;

struct State<T> {
    docs: Vec<T>,
    closed: bool,
}

/// A document collection backed by a JSON-lines file.
///
/// All documents live in memory; every write goes to disk before it becomes
/// visible to readers. Updates hold the write lock across find, mutate and
/// persist, so concurrent updates of one document never lose a change.
pub struct JsonlCollection<T> {
    name: &'static str,
    path: PathBuf,
    state: RwLock<State<T>>,
}

impl<T> JsonlCollection<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Open (or create) the collection file at `path` and load its documents
    pub async fn open(name: &'static str, path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        if !fs::try_exists(&path).await? {
            fs::write(&path, b"").await?;
        }

        let raw = fs::read_to_string(&path).await?;
        if !raw.is_empty() && !raw.ends_with('\n') {
            // Later appends must start on a fresh line
            let mut file = OpenOptions::new().append(true).open(&path).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        let mut docs = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let doc = serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                collection: name,
                line: idx + 1,
                source,
            })?;
            docs.push(doc);
        }

        info!(collection = name, documents = docs.len(), path = %path.display(), "Collection opened");

        Ok(Self {
            name,
            path,
            state: RwLock::new(State { docs, closed: false }),
        })
    }

    /// Append a document
    pub async fn insert(&self, doc: T) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(StoreError::Closed);
        }

        let mut line = serde_json::to_string(&doc)?;
        line.push('\n');

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        let len = file.metadata().await?.len();
        if let Err(e) = write_line(&mut file, line.as_bytes()).await {
            file.set_len(len).await?;
            return Err(e.into());
        }

        state.docs.push(doc);
        debug!(collection = self.name, total = state.docs.len(), "Document inserted");
        Ok(())
    }

    /// Documents matching `filter` in insertion order, at most `limit` of them
    pub async fn find<F>(&self, filter: F, limit: Option<usize>) -> Result<Vec<T>, StoreError>
    where
        F: Fn(&T) -> bool,
    {
        let state = self.state.read().await;
        if state.closed {
            return Err(StoreError::Closed);
        }

        Ok(state
            .docs
            .iter()
            .filter(|doc| filter(doc))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    /// Atomically apply `update` to the first document matching `filter`.
    ///
    /// Returns the updated document, or `None` when nothing matched.
    pub async fn update_one<F, U>(&self, filter: F, update: U) -> Result<Option<T>, StoreError>
    where
        F: Fn(&T) -> bool,
        U: FnOnce(&mut T),
    {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(StoreError::Closed);
        }

        let Some(pos) = state.docs.iter().position(|doc| filter(doc)) else {
            return Ok(None);
        };

        let mut updated = state.docs[pos].clone();
        update(&mut updated);

        let mut contents = String::new();
        for (idx, doc) in state.docs.iter().enumerate() {
            let doc = if idx == pos { &updated } else { doc };
            contents.push_str(&serde_json::to_string(doc)?);
            contents.push('\n');
        }
        self.replace_file(contents.as_bytes()).await?;

        state.docs[pos] = updated.clone();
        Ok(Some(updated))
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.docs.len())
    }

    /// Refuse all further operations. Waits for in-flight operations.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        state.closed = true;
        debug!(collection = self.name, "Collection closed");
    }

    async fn replace_file(&self, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn write_line(file: &mut fs::File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await
}
