//! Per-host request pacing for polite crawling.
//!
//! Each host gets a "next start" slot. A caller reserves the next slot under
//! the map lock, then sleeps outside the lock until its slot arrives, so two
//! workers targeting the same host can never both pass with a short wait,
//! and hosts never block each other.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use trawl_core::throttle::HostThrottle;
//!
//! # async fn run() -> Result<(), trawl_core::AppError> {
//! let throttle = HostThrottle::new(Duration::from_secs(1));
//! let cancel = CancellationToken::new();
//! throttle.wait_for_host("example.com", &cancel).await?;
//! // ... issue the request ...
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Enforces a minimum gap between request starts on the same host.
#[derive(Clone)]
pub struct HostThrottle {
    delay: Duration,
    /// Start time of the most recently reserved request per host.
    last_start: Arc<Mutex<HashMap<String, Instant>>>,
}

impl HostThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reserve the next start slot for `host` and return when it is.
    async fn reserve(&self, host: &str) -> Instant {
        let mut map = self.last_start.lock().await;
        let now = Instant::now();
        let start = match map.get(host) {
            Some(&last) => (last + self.delay).max(now),
            None => now,
        };
        map.insert(host.to_string(), start);
        start
    }

    /// Wait until a request to `host` may start.
    ///
    /// Returns [`AppError::Cancelled`] if `cancel` fires first; the reserved
    /// slot is kept either way.
    pub async fn wait_for_host(
        &self,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let start = self.reserve(host).await;
        let now = Instant::now();
        if start <= now {
            return Ok(());
        }

        let wait = start - now;
        tracing::debug!(
            host = %host,
            sleep_ms = %wait.as_millis(),
            "Throttling request"
        );
        tokio::select! {
            () = tokio::time::sleep_until(start.into()) => Ok(()),
            () = cancel.cancelled() => Err(AppError::Cancelled),
        }
    }
}
