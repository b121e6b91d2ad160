use std::fmt;

use crate::error::AppError;
use crate::models::RunStats;

/// Why a worker left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    BudgetReached,
    FrontierExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cancelled => "cancelled",
            Self::BudgetReached => "budget_reached",
            Self::FrontierExhausted => "frontier_exhausted",
        };
        f.write_str(s)
    }
}

/// Events emitted by the crawl engine for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    RunStarted {
        seeds: usize,
        workers: usize,
    },
    SeedRejected {
        url: &'a str,
    },
    WorkerStarted {
        worker_id: usize,
    },
    Fetching {
        url: &'a str,
        depth: u32,
    },
    Disallowed {
        url: &'a str,
    },
    PolicyFailed {
        url: &'a str,
        error: &'a AppError,
    },
    FetchFailed {
        url: &'a str,
        error: &'a AppError,
    },
    ParseFailed {
        url: &'a str,
        error: &'a AppError,
    },
    PageCrawled {
        url: &'a str,
        depth: u32,
        links: usize,
    },
    StoreFailed {
        url: &'a str,
        error: &'a AppError,
    },
    WorkerStopped {
        worker_id: usize,
        reason: StopReason,
    },
    RunFinished {
        stats: &'a RunStats,
    },
}

impl CrawlEvent<'_> {
    /// Stable snake_case name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::SeedRejected { .. } => "seed_rejected",
            Self::WorkerStarted { .. } => "worker_started",
            Self::Fetching { .. } => "fetching",
            Self::Disallowed { .. } => "disallowed",
            Self::PolicyFailed { .. } => "policy_failed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::ParseFailed { .. } => "parse_failed",
            Self::PageCrawled { .. } => "page_crawled",
            Self::StoreFailed { .. } => "store_failed",
            Self::WorkerStopped { .. } => "worker_stopped",
            Self::RunFinished { .. } => "run_finished",
        }
    }
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl CrawlReporter for SilentReporter {}

/// Reporter that uses the `tracing` crate.
///
/// Per-URL skips and failures go to `debug` unless `verbose` is set, in
/// which case they are raised to `info` and `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter {
    verbose: bool,
}

impl TracingReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl CrawlReporter for TracingReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let verbose = self.verbose;
        match event {
            CrawlEvent::RunStarted { seeds, workers } => {
                tracing::info!(%seeds, %workers, "Crawl started");
            }
            CrawlEvent::SeedRejected { url } => {
                tracing::warn!(%url, "Seed rejected");
            }
            CrawlEvent::WorkerStarted { worker_id } => {
                tracing::debug!(%worker_id, "Worker started");
            }
            CrawlEvent::Fetching { url, depth } => {
                if verbose {
                    tracing::info!(%url, %depth, "Fetching");
                } else {
                    tracing::debug!(%url, %depth, "Fetching");
                }
            }
            CrawlEvent::Disallowed { url } => {
                if verbose {
                    tracing::info!(%url, "Disallowed by robots.txt");
                } else {
                    tracing::debug!(%url, "Disallowed by robots.txt");
                }
            }
            CrawlEvent::PolicyFailed { url, error } => {
                if verbose {
                    tracing::warn!(%url, %error, "Robots check failed");
                } else {
                    tracing::debug!(%url, %error, "Robots check failed");
                }
            }
            CrawlEvent::FetchFailed { url, error } => {
                let transient = error.is_transient();
                if verbose {
                    tracing::warn!(%url, %error, %transient, "Fetch failed");
                } else {
                    tracing::debug!(%url, %error, %transient, "Fetch failed");
                }
            }
            CrawlEvent::ParseFailed { url, error } => {
                if verbose {
                    tracing::warn!(%url, %error, "Parse failed");
                } else {
                    tracing::debug!(%url, %error, "Parse failed");
                }
            }
            CrawlEvent::PageCrawled { url, depth, links } => {
                tracing::info!(%url, %depth, %links, "Page crawled");
            }
            CrawlEvent::StoreFailed { url, error } => {
                tracing::warn!(%url, %error, "Failed to save page");
            }
            CrawlEvent::WorkerStopped { worker_id, reason } => {
                tracing::debug!(%worker_id, %reason, "Worker stopped");
            }
            CrawlEvent::RunFinished { stats } => {
                tracing::info!(
                    pages = %stats.pages_crawled,
                    links = %stats.links_discovered,
                    failed = %stats.pages_failed,
                    disallowed = %stats.pages_disallowed,
                    elapsed_ms = %stats.elapsed().as_millis(),
                    "Crawl finished"
                );
            }
        }
    }
}
