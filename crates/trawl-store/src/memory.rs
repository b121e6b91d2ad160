use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use trawl_core::error::AppError;
use trawl_core::models::PageRecord;
use trawl_core::traits::PageStore;

/// Keeps records in memory. Clones share the same buffer, so a caller can
/// read pages while the crawl is still running.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<PageRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<PageRecord>> {
        self.records.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned memory store lock");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<PageRecord>> {
        self.records.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned memory store lock");
            poisoned.into_inner()
        })
    }

    /// Copy of every record saved so far, in save order.
    pub fn records(&self) -> Vec<PageRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl PageStore for MemoryStore {
    async fn save(&self, record: &PageRecord) -> Result<(), AppError> {
        self.write().push(record.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn test_clones_share_records() {
        let store = MemoryStore::new();
        let reader = store.clone();
        assert!(reader.is_empty());

        let record = PageRecord {
            url: "http://a.test/".into(),
            title: String::new(),
            description: String::new(),
            content: None,
            links: vec![],
            crawled_at: Utc::now(),
            depth: 0,
        };
        store.save(&record).await.unwrap();
        store.close().await.unwrap();

        assert_eq!(reader.len(), 1);
        assert_eq!(reader.records()[0], record);
    }
}
