use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use trawl_client::ReqwestFetcher;
use trawl_core::error::AppError;
use trawl_core::{CrawlConfig, CrawlHandle};
use trawl_store::MemoryStore;

use crate::config::ServerConfig;
use crate::dto::RunStatus;

/// Finished runs beyond this count are dropped, oldest first.
const MAX_RETAINED_RUNS: usize = 100;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// API key for `/v1` routes (None = open access).
    pub api_key: Option<String>,
    pub allow_private_urls: bool,
    pub runs: RunRegistry,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            allow_private_urls: config.allow_private_urls,
            runs: RunRegistry::default(),
        }
    }

    /// HTTP fetcher for one crawl, honouring the private-address setting.
    pub fn fetcher(&self, config: &CrawlConfig) -> Result<ReqwestFetcher, AppError> {
        let fetcher = ReqwestFetcher::from_config(config)?;
        Ok(if self.allow_private_urls {
            fetcher.allow_private_urls()
        } else {
            fetcher
        })
    }
}

/// A background crawl started through `POST /v1/runs`.
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub id: Uuid,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub handle: CrawlHandle,
    /// Pages saved so far; readable while the run is in progress.
    pub pages: MemoryStore,
}

impl RunEntry {
    pub fn status(&self) -> RunStatus {
        match (self.handle.is_finished(), self.handle.is_cancelled()) {
            (false, false) => RunStatus::Running,
            (false, true) => RunStatus::Cancelling,
            (true, false) => RunStatus::Completed,
            (true, true) => RunStatus::Cancelled,
        }
    }
}

#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<Uuid, RunEntry>>,
}

impl RunRegistry {
    pub async fn insert(&self, entry: RunEntry) {
        let mut runs = self.runs.write().await;
        runs.insert(entry.id, entry);

        if runs.len() > MAX_RETAINED_RUNS {
            let mut finished: Vec<(DateTime<Utc>, Uuid)> = runs
                .values()
                .filter(|run| run.handle.is_finished())
                .map(|run| (run.created_at, run.id))
                .collect();
            finished.sort();
            let excess = runs.len() - MAX_RETAINED_RUNS;
            for (_, id) in finished.into_iter().take(excess) {
                runs.remove(&id);
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<RunEntry> {
        self.runs.read().await.get(&id).cloned()
    }

    /// Runs that have not finished yet.
    pub async fn active_count(&self) -> usize {
        self.runs
            .read()
            .await
            .values()
            .filter(|run| !run.handle.is_finished())
            .count()
    }

    /// Cancel every unfinished run and wait for them to wind down.
    pub async fn cancel_all(&self) {
        let handles: Vec<CrawlHandle> = self
            .runs
            .read()
            .await
            .values()
            .filter(|run| !run.handle.is_finished())
            .map(|run| run.handle.clone())
            .collect();

        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            handle.wait().await;
        }
    }
}
