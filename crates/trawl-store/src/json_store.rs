use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use trawl_core::error::AppError;
use trawl_core::models::PageRecord;
use trawl_core::traits::PageStore;

#[derive(Debug, Default)]
struct JsonInner {
    records: Vec<PageRecord>,
    closed: bool,
}

/// Buffers records in memory and writes them as one pretty-printed JSON
/// array when the store is closed.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    inner: Arc<Mutex<JsonInner>>,
}

impl JsonStore {
    /// Create (or truncate) the output file so path errors surface before
    /// the crawl starts.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        std::fs::File::create(&path)?;
        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(JsonInner::default())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records buffered so far.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

impl PageStore for JsonStore {
    async fn save(&self, record: &PageRecord) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(AppError::StorageError(format!(
                "{} is already closed",
                self.path.display()
            )));
        }
        inner.records.push(record.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&inner.records)?;
        tokio::fs::write(&self.path, bytes).await?;
        inner.closed = true;

        tracing::debug!(
            path = %self.path.display(),
            records = inner.records.len(),
            "JSON output written"
        );
        Ok(())
    }
}
