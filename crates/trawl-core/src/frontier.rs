//! FIFO work queue of URLs with duplicate suppression.
//!
//! Every address is accepted at most once per run. Two addresses that only
//! differ in query string or fragment share a normalized key and are also
//! accepted at most once, whichever arrives first wins.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::util::normalize_url;

/// A pending unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<FrontierEntry>,
    seen_raw: HashSet<String>,
    seen_normalized: HashSet<String>,
}

/// Thread-safe URL frontier. All operations share a single lock.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned frontier mutex");
            poisoned.into_inner()
        })
    }

    /// Enqueue `url` at `depth`.
    ///
    /// Returns false without touching the queue when the URL was already
    /// accepted, is not absolute, or normalizes to an accepted key.
    pub fn add(&self, url: &str, depth: u32) -> bool {
        let mut inner = self.lock_inner();

        if inner.seen_raw.contains(url) {
            return false;
        }
        let Some(normalized) = normalize_url(url) else {
            return false;
        };
        if inner.seen_normalized.contains(&normalized) {
            return false;
        }

        inner.seen_raw.insert(url.to_string());
        inner.seen_normalized.insert(normalized);
        inner.queue.push_back(FrontierEntry {
            url: url.to_string(),
            depth,
        });
        true
    }

    /// Pop the oldest pending entry.
    pub fn next(&self) -> Option<FrontierEntry> {
        self.lock_inner().queue.pop_front()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.lock_inner().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().queue.is_empty()
    }

    /// Number of distinct raw addresses ever accepted.
    pub fn visited_count(&self) -> usize {
        self.lock_inner().seen_raw.len()
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.lock_inner().seen_raw.contains(url)
    }

    /// Reset queue and dedup sets. Only meant for use between runs.
    pub fn clear(&self) {
        let mut inner = self.lock_inner();
        inner.queue.clear();
        inner.seen_raw.clear();
        inner.seen_normalized.clear();
    }
}
