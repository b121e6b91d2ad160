//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::models::{FetchedPage, PageRecord, ParseOptions, ParsedPage};
use crate::reporter::{CrawlEvent, CrawlReporter};
use crate::traits::{Fetcher, PageParser, PageStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MockRoute {
    Page {
        status: u16,
        content_type: String,
        body: String,
        /// Reported final URL when the request was redirected.
        final_url: Option<String>,
    },
    NetworkError(String),
}

/// One recorded fetch call.
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub url: String,
    pub at: Instant,
}

/// Mock fetcher serving a fixed route table. Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, MockRoute>>>,
    calls: Arc<Mutex<Vec<FetchCall>>>,
    latency: Duration,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, status: u16, content_type: &str, body: &str) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            MockRoute::Page {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
                final_url: None,
            },
        );
        self
    }

    /// HTML page at `url` that reports `final_url` as its address, as a
    /// fetcher following a redirect would.
    pub fn with_redirected_html(self, url: &str, final_url: &str, body: &str) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            MockRoute::Page {
                status: 200,
                content_type: "text/html".to_string(),
                body: body.to_string(),
                final_url: Some(final_url.to_string()),
            },
        );
        self
    }

    pub fn with_html(self, url: &str, body: &str) -> Self {
        self.with_page(url, 200, "text/html; charset=utf-8", body)
    }

    pub fn with_text(self, url: &str, body: &str) -> Self {
        self.with_page(url, 200, "text/plain", body)
    }

    pub fn with_network_error(self, url: &str, message: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), MockRoute::NetworkError(message.to_string()));
        self
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchedPage, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.latency) => {}
                () = cancel.cancelled() => return Err(AppError::Cancelled),
            }
        }

        let route = self.routes.lock().unwrap().get(url).cloned();
        match route {
            Some(MockRoute::Page {
                status,
                content_type,
                body,
                final_url,
            }) => Ok(FetchedPage {
                url: final_url.unwrap_or_else(|| url.to_string()),
                status,
                content_type: Some(content_type),
                body,
            }),
            Some(MockRoute::NetworkError(message)) => Err(AppError::NetworkError(message)),
            None => Ok(FetchedPage {
                url: url.to_string(),
                status: 404,
                content_type: Some("text/plain".to_string()),
                body: "not found".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser: every body line starting with `http` is a link, lines
/// starting with `/` are links relative to the base URL, and the title is
/// the base URL.
#[derive(Clone, Default)]
pub struct MockParser {
    fail: bool,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl PageParser for MockParser {
    fn parse(
        &self,
        html: &str,
        base_url: &str,
        _options: &ParseOptions,
    ) -> Result<ParsedPage, AppError> {
        if self.fail {
            return Err(AppError::ParseError("mock parse failure".into()));
        }
        let base = Url::parse(base_url).ok();
        let links = html
            .lines()
            .map(str::trim)
            .filter_map(|line| {
                if line.starts_with("http") {
                    Some(line.to_string())
                } else if line.starts_with('/') {
                    base.as_ref()?.join(line).ok().map(String::from)
                } else {
                    None
                }
            })
            .collect();
        Ok(ParsedPage {
            title: base_url.to_string(),
            description: String::new(),
            content: Some(html.to_string()),
            links,
        })
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store recording saved records and close calls.
#[derive(Clone, Default)]
pub struct MockStore {
    records: Arc<Mutex<Vec<PageRecord>>>,
    closes: Arc<AtomicUsize>,
    fail_saves: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every save fails, but is still recorded.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<PageRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn saved_urls(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.url).collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl PageStore for MockStore {
    async fn save(&self, record: &PageRecord) -> Result<(), AppError> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail_saves {
            return Err(AppError::StorageError("disk full".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock reporter keeping the name of every event it receives.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| **e == name).count()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        self.events.lock().unwrap().push(event.name());
    }
}
