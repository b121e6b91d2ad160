//! The crawl engine: a fixed pool of workers draining a shared frontier.
//!
//! Each worker loops over: reserve page budget, pull the next entry, wait
//! for the per-host throttle, consult robots.txt, fetch, parse, store, and
//! push discovered links back onto the frontier. A worker that finds the
//! frontier empty only retires once no other worker is still processing a
//! page, since that page may yield new links.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::CrawlConfig;
use crate::error::AppError;
use crate::frontier::{Frontier, FrontierEntry};
use crate::lifecycle::{PageSlot, Reservation, RunState};
use crate::models::{PageRecord, ParseOptions, ParsedPage, RunStats};
use crate::reporter::{CrawlEvent, CrawlReporter, StopReason, TracingReporter};
use crate::robots::RobotsCache;
use crate::throttle::HostThrottle;
use crate::traits::{Fetcher, PageParser, PageStore};
use crate::util::host_of;

/// How long an idle worker sleeps before looking at the frontier again.
const IDLE_WAIT: Duration = Duration::from_millis(25);

/// Builder for a crawl run.
pub struct Crawler<F, P, S> {
    config: CrawlConfig,
    fetcher: F,
    parser: P,
    store: S,
    reporter: Arc<dyn CrawlReporter>,
}

impl<F, P, S> Crawler<F, P, S>
where
    F: Fetcher + 'static,
    P: PageParser + 'static,
    S: PageStore + 'static,
{
    pub fn new(config: CrawlConfig, fetcher: F, parser: P, store: S) -> Self {
        let reporter = Arc::new(TracingReporter::new(config.verbose));
        Self {
            config,
            fetcher,
            parser,
            store,
            reporter,
        }
    }

    pub fn with_reporter(mut self, reporter: impl CrawlReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Seed the frontier and spawn the worker pool on the current tokio runtime.
    ///
    /// Seeds that are not absolute URLs (or duplicates) are reported and
    /// skipped. Fails with [`AppError::ConfigError`] when the configuration
    /// is invalid or no seed was accepted.
    pub fn start<I>(self, seeds: I) -> Result<CrawlHandle, AppError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.config.validate()?;

        let frontier = Arc::new(Frontier::new());
        let mut accepted = 0;
        for seed in seeds {
            let seed = seed.as_ref().trim();
            if frontier.add(seed, 0) {
                accepted += 1;
            } else {
                self.reporter.report(CrawlEvent::SeedRejected { url: seed });
            }
        }
        if accepted == 0 {
            return Err(AppError::ConfigError(
                "at least one valid absolute seed URL is required".into(),
            ));
        }

        let cancel = CancellationToken::new();
        let state = Arc::new(RunState::new(self.config.max_pages, cancel.clone()));
        let robots = RobotsCache::new(self.fetcher.clone()).with_cancellation(cancel);
        let throttle = HostThrottle::new(self.config.delay);

        self.reporter.report(CrawlEvent::RunStarted {
            seeds: accepted,
            workers: self.config.workers,
        });

        let engine = Arc::new(Engine {
            config: self.config,
            fetcher: self.fetcher,
            parser: self.parser,
            store: self.store,
            reporter: self.reporter,
            robots,
            throttle,
            frontier: Arc::clone(&frontier),
            state: Arc::clone(&state),
            busy: AtomicUsize::new(0),
        });
        tokio::spawn(engine.run());

        Ok(CrawlHandle { state, frontier })
    }

    /// Start a run and wait for it to finish.
    pub async fn run<I>(self, seeds: I) -> Result<RunStats, AppError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let handle = self.start(seeds)?;
        Ok(handle.wait().await)
    }
}

/// Control surface of a running (or finished) crawl.
#[derive(Debug, Clone)]
pub struct CrawlHandle {
    state: Arc<RunState>,
    frontier: Arc<Frontier>,
}

impl CrawlHandle {
    /// Ask all workers to stop. In-flight fetches are aborted; pages that
    /// were already saved stay saved.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Point-in-time copy of the run counters.
    pub fn stats(&self) -> RunStats {
        self.state.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Resolve once every worker has exited and the store is closed.
    pub async fn wait(&self) -> RunStats {
        self.state.wait().await
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn visited_count(&self) -> usize {
        self.frontier.visited_count()
    }
}

/// Marks a worker as processing a page for as long as it is alive.
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Engine<F, P, S> {
    config: CrawlConfig,
    fetcher: F,
    parser: P,
    store: S,
    reporter: Arc<dyn CrawlReporter>,
    robots: RobotsCache<F>,
    throttle: HostThrottle,
    frontier: Arc<Frontier>,
    state: Arc<RunState>,
    busy: AtomicUsize,
}

impl<F, P, S> Engine<F, P, S>
where
    F: Fetcher + 'static,
    P: PageParser + 'static,
    S: PageStore + 'static,
{
    async fn run(self: Arc<Self>) {
        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers {
            let engine = Arc::clone(&self);
            workers.spawn(async move { engine.run_worker(worker_id).await });
        }
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Crawl worker panicked");
            }
        }

        if let Err(e) = self.store.close().await {
            tracing::error!(error = %e, "Failed to close page store");
        }
        let stats = self.state.stamp_end();
        self.reporter.report(CrawlEvent::RunFinished { stats: &stats });
        self.state.finish();
    }

    async fn run_worker(&self, worker_id: usize) {
        self.reporter.report(CrawlEvent::WorkerStarted { worker_id });

        let reason = loop {
            if self.state.is_cancelled() {
                break StopReason::Cancelled;
            }

            let slot = match self.state.try_reserve() {
                Reservation::Granted(slot) => slot,
                Reservation::Exhausted => break StopReason::BudgetReached,
                Reservation::Pending => {
                    if !self.idle().await {
                        break StopReason::Cancelled;
                    }
                    continue;
                }
            };

            let busy = Busy::enter(&self.busy);
            let Some(entry) = self.frontier.next() else {
                drop(slot);
                drop(busy);
                if self.busy.load(Ordering::SeqCst) == 0 && self.frontier.is_empty() {
                    break StopReason::FrontierExhausted;
                }
                if !self.idle().await {
                    break StopReason::Cancelled;
                }
                continue;
            };

            if entry.depth > self.config.max_depth {
                continue;
            }
            self.process(&entry, slot).await;
        };

        self.reporter
            .report(CrawlEvent::WorkerStopped { worker_id, reason });
    }

    /// Sleep briefly. Returns false if the run was cancelled meanwhile.
    async fn idle(&self) -> bool {
        tokio::select! {
            () = tokio::time::sleep(IDLE_WAIT) => true,
            () = self.state.cancellation_token().cancelled() => false,
        }
    }

    async fn process(&self, entry: &FrontierEntry, slot: PageSlot<'_>) {
        let url = entry.url.as_str();
        let cancel = self.state.cancellation_token();

        // The frontier only accepts URLs with a host.
        let Some(host) = host_of(url) else {
            return;
        };
        if self.throttle.wait_for_host(&host, cancel).await.is_err() {
            return;
        }
        if self.config.respect_robots && !self.check_policy(url, cancel).await {
            return;
        }

        self.reporter.report(CrawlEvent::Fetching {
            url,
            depth: entry.depth,
        });
        let page = match self.fetcher.fetch(url, cancel).await {
            Ok(page) => page,
            Err(e) if e.is_cancelled() => return,
            Err(e) => return self.fetch_failed(url, &e),
        };
        if !page.is_success() {
            let error = AppError::HttpStatus {
                status: page.status,
                url: url.to_string(),
            };
            return self.fetch_failed(url, &error);
        }
        if !page.is_html() {
            let error = AppError::UnsupportedContent {
                content_type: page.content_type.unwrap_or_default(),
                url: url.to_string(),
            };
            return self.fetch_failed(url, &error);
        }

        // Links resolve against the frontier address so they agree with the
        // host used for the same-domain check, even after a redirect.
        let parsed = match self.parse(page.body, url.to_string()).await {
            Ok(parsed) => parsed,
            Err(error) => {
                self.state.record_failure();
                self.reporter
                    .report(CrawlEvent::ParseFailed { url, error: &error });
                return;
            }
        };

        let ParsedPage {
            title,
            description,
            content,
            links,
        } = parsed;
        slot.commit(links.len() as u64);
        self.reporter.report(CrawlEvent::PageCrawled {
            url,
            depth: entry.depth,
            links: links.len(),
        });

        let record = PageRecord {
            url: url.to_string(),
            title,
            description,
            content,
            links: if self.config.extract_links {
                links.clone()
            } else {
                Vec::new()
            },
            crawled_at: Utc::now(),
            depth: entry.depth,
        };
        if let Err(error) = self.store.save(&record).await {
            self.reporter
                .report(CrawlEvent::StoreFailed { url, error: &error });
        }

        if !self.config.seed_only {
            self.enqueue_links(&host, &links, entry.depth + 1);
        }
    }

    /// Returns true when the URL may be fetched now.
    async fn check_policy(&self, url: &str, cancel: &CancellationToken) -> bool {
        let decision = match self.robots.is_allowed(url, &self.config.user_agent).await {
            Ok(decision) => decision,
            Err(error) => {
                self.state.record_failure();
                self.reporter
                    .report(CrawlEvent::PolicyFailed { url, error: &error });
                return false;
            }
        };

        if !decision.allowed {
            self.state.record_disallowed();
            self.reporter.report(CrawlEvent::Disallowed { url });
            return false;
        }

        let extra = decision.crawl_delay.saturating_sub(self.config.delay);
        if !extra.is_zero() {
            tracing::debug!(%url, extra_ms = %extra.as_millis(), "Honouring robots.txt crawl delay");
            tokio::select! {
                () = tokio::time::sleep(extra) => {}
                () = cancel.cancelled() => return false,
            }
        }
        true
    }

    /// Parsing is CPU-bound, so it runs off the async worker threads.
    async fn parse(&self, body: String, base_url: String) -> Result<ParsedPage, AppError> {
        let parser = self.parser.clone();
        let options = ParseOptions {
            news_mode: self.config.news_mode,
        };
        match tokio::task::spawn_blocking(move || parser.parse(&body, &base_url, &options)).await
        {
            Ok(result) => result,
            Err(e) => Err(AppError::ParseError(format!("parser task failed: {e}"))),
        }
    }

    fn fetch_failed(&self, url: &str, error: &AppError) {
        self.state.record_failure();
        self.reporter.report(CrawlEvent::FetchFailed { url, error });
    }

    fn enqueue_links(&self, page_host: &str, links: &[String], depth: u32) {
        let mut queued = 0usize;
        for link in links {
            if self.config.stay_on_domain && host_of(link).as_deref() != Some(page_host) {
                continue;
            }
            if let Some(filter) = &self.config.url_filter
                && !link.contains(filter.as_str())
            {
                continue;
            }
            if self.frontier.add(link, depth) {
                queued += 1;
            }
        }
        tracing::debug!(host = %page_host, found = links.len(), %queued, "Links enqueued");
    }
}
