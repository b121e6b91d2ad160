use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A crawled page as handed to a [`PageStore`](crate::traits::PageStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    pub crawled_at: DateTime<Utc>,
    pub depth: u32,
}

/// Raw response returned by a [`Fetcher`](crate::traits::Fetcher).
///
/// Status and content type are reported as-is; the engine decides
/// whether the page is usable.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for `text/html` and `application/xhtml+xml` responses.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml+xml")
        })
    }
}

/// Options forwarded to the [`PageParser`](crate::traits::PageParser).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Extract article body text instead of every paragraph.
    pub news_mode: bool,
}

/// Output of content extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    /// Absolute http(s) links, fragments removed, non-page resources filtered.
    pub links: Vec<String>,
}

/// Counters and timestamps for one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub pages_crawled: u64,
    pub links_discovered: u64,
    /// Fetch or parse failures (the URL was skipped).
    pub pages_failed: u64,
    /// URLs skipped because robots.txt disallowed them.
    pub pages_disallowed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            pages_crawled: 0,
            links_discovered: 0,
            pages_failed: 0,
            pages_disallowed: 0,
            started_at,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Wall-clock duration of the run, up to now if it is still going.
    pub fn elapsed(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }
}
