//! Run statistics, page budget, cancellation and the completion signal.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::models::RunStats;

#[derive(Debug)]
struct Counters {
    stats: RunStats,
    /// Pages reserved by workers but not yet committed or released.
    in_flight: u64,
}

/// Shared state of one crawl run.
///
/// Counters and budget live under one lock, separate from the frontier,
/// the throttle map and the robots cache.
#[derive(Debug)]
pub struct RunState {
    counters: Mutex<Counters>,
    max_pages: u64,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

/// Result of asking for permission to fetch one more page.
#[derive(Debug)]
pub enum Reservation<'a> {
    Granted(PageSlot<'a>),
    /// The budget is spent; the worker should retire.
    Exhausted,
    /// Pages in flight may still fail and free budget; try again shortly.
    Pending,
}

/// A reserved unit of page budget.
///
/// Dropping the slot without calling [`PageSlot::commit`] returns the budget.
#[derive(Debug)]
pub struct PageSlot<'a> {
    state: &'a RunState,
    committed: bool,
}

impl PageSlot<'_> {
    /// Count the page as crawled, together with the links found on it.
    pub fn commit(mut self, links: u64) {
        let mut counters = self.state.lock_counters();
        counters.in_flight -= 1;
        counters.stats.pages_crawled += 1;
        counters.stats.links_discovered += links;
        self.committed = true;
    }
}

impl Drop for PageSlot<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.lock_counters().in_flight -= 1;
        }
    }
}

impl RunState {
    /// `max_pages == 0` disables the budget.
    pub fn new(max_pages: u64, cancel: CancellationToken) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            counters: Mutex::new(Counters {
                stats: RunStats::new(Utc::now()),
                in_flight: 0,
            }),
            max_pages,
            cancel,
            done,
        }
    }

    fn lock_counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned run stats mutex");
            poisoned.into_inner()
        })
    }

    pub fn try_reserve(&self) -> Reservation<'_> {
        let mut counters = self.lock_counters();
        if self.max_pages > 0 {
            if counters.stats.pages_crawled >= self.max_pages {
                return Reservation::Exhausted;
            }
            if counters.stats.pages_crawled + counters.in_flight >= self.max_pages {
                return Reservation::Pending;
            }
        }
        counters.in_flight += 1;
        Reservation::Granted(PageSlot {
            state: self,
            committed: false,
        })
    }

    pub fn record_failure(&self) {
        self.lock_counters().stats.pages_failed += 1;
    }

    pub fn record_disallowed(&self) {
        self.lock_counters().stats.pages_disallowed += 1;
    }

    pub fn snapshot(&self) -> RunStats {
        self.lock_counters().stats.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record the end time without signalling completion. Idempotent.
    pub fn stamp_end(&self) -> RunStats {
        let mut counters = self.lock_counters();
        if counters.stats.finished_at.is_none() {
            counters.stats.finished_at = Some(Utc::now());
        }
        counters.stats.clone()
    }

    /// Stamp the end time and fire the completion signal.
    ///
    /// Only the first call has any effect.
    pub fn finish(&self) -> RunStats {
        let stats = self.stamp_end();
        self.done.send_if_modified(|done| !std::mem::replace(done, true));
        stats
    }

    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait for [`RunState::finish`] and return the final stats.
    pub async fn wait(&self) -> RunStats {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|done| *done).await;
        self.snapshot()
    }
}
