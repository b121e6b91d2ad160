use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trawl_core::error::AppError;
use trawl_core::models::{PageRecord, RunStats};
use trawl_core::CrawlConfig;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub const MAX_DEPTH: u32 = 5;
pub const MAX_PAGES: u64 = 100;
pub const MAX_WORKERS: usize = 10;
pub const MAX_DELAY_SECS: f64 = 10.0;
pub const MIN_TIMEOUT_SECS: f64 = 5.0;
pub const MAX_TIMEOUT_SECS: f64 = 60.0;

fn default_depth() -> u32 {
    1
}

fn default_max_pages() -> u64 {
    20
}

fn default_workers() -> usize {
    2
}

fn default_delay() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

/// Reject anything that is not an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<(), AppError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::invalid_url(
            url,
            "URL must start with http:// or https://",
        ))
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CrawlRequest {
    /// Seed URL
    pub url: String,
    /// Store discovered links with each page
    #[serde(default)]
    pub extract_links: bool,
    /// Maximum link depth (0-5)
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Maximum pages to crawl (1-100)
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
    /// Concurrent workers (1-10)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Only follow links on the page's own host
    #[serde(default = "default_true")]
    pub stay_domain: bool,
    /// Only follow links containing this substring
    #[serde(default)]
    pub filter: Option<String>,
    /// Fetch the seed only
    #[serde(default)]
    pub seed_only: bool,
    /// Extract article text instead of every paragraph
    #[serde(default)]
    pub news: bool,
    /// Seconds between requests to one host (0-10)
    #[serde(default = "default_delay")]
    pub delay: f64,
    /// Per-request timeout in seconds (5-60)
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Respect robots.txt
    #[serde(default = "default_true")]
    pub respect_robots: bool,
}

impl CrawlRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_url(&self.url)?;
        if self.depth > MAX_DEPTH {
            return Err(AppError::ConfigError(format!(
                "depth must be between 0 and {MAX_DEPTH}"
            )));
        }
        if !(1..=MAX_PAGES).contains(&self.max_pages) {
            return Err(AppError::ConfigError(format!(
                "max_pages must be between 1 and {MAX_PAGES}"
            )));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(AppError::ConfigError(format!(
                "workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        if !(0.0..=MAX_DELAY_SECS).contains(&self.delay) {
            return Err(AppError::ConfigError(format!(
                "delay must be between 0 and {MAX_DELAY_SECS} seconds"
            )));
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout) {
            return Err(AppError::ConfigError(format!(
                "timeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds"
            )));
        }
        Ok(())
    }

    /// Engine settings for this request. Call [`validate`](Self::validate) first.
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig::default()
            .with_max_depth(self.depth)
            .with_max_pages(self.max_pages)
            .with_workers(self.workers)
            .with_delay(Duration::from_secs_f64(self.delay))
            .with_timeout(Duration::from_secs_f64(self.timeout))
            .with_stay_on_domain(self.stay_domain)
            .with_url_filter(self.filter.clone())
            .with_seed_only(self.seed_only)
            .with_news_mode(self.news)
            .with_extract_links(self.extract_links)
            .with_respect_robots(self.respect_robots)
    }

    /// Upper bound for a synchronous crawl: every page timing out, plus slack.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs_f64(self.timeout * self.max_pages as f64 + 30.0)
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ScrapeRequest {
    /// Page to fetch
    pub url: String,
    /// Include the page's links in the response
    #[serde(default)]
    pub extract_links: bool,
    /// Extract article text instead of every paragraph
    #[serde(default)]
    pub news: bool,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LinksRequest {
    /// Page to extract links from
    pub url: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PageResponse {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub links: Option<Vec<String>>,
    pub crawled_at: DateTime<Utc>,
    pub depth: u32,
}

impl From<PageRecord> for PageResponse {
    fn from(record: PageRecord) -> Self {
        Self {
            url: record.url,
            title: record.title,
            description: record.description,
            content: record.content,
            links: (!record.links.is_empty()).then_some(record.links),
            crawled_at: record.crawled_at,
            depth: record.depth,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub pages_crawled: u64,
    pub links_discovered: u64,
    pub pages_failed: u64,
    pub pages_disallowed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: f64,
}

impl From<RunStats> for StatsResponse {
    fn from(stats: RunStats) -> Self {
        Self {
            elapsed_seconds: stats.elapsed().as_secs_f64(),
            pages_crawled: stats.pages_crawled,
            links_discovered: stats.links_discovered,
            pages_failed: stats.pages_failed,
            pages_disallowed: stats.pages_disallowed,
            started_at: stats.started_at,
            finished_at: stats.finished_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CrawlResponse {
    pub pages_crawled: u64,
    pub pages: Vec<PageResponse>,
    pub execution_time_seconds: f64,
    pub stats: StatsResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LinksResponse {
    pub url: String,
    pub links_found: usize,
    pub links: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// Cancel requested, workers still winding down.
    Cancelling,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RunResponse {
    pub id: Uuid,
    pub url: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    /// Entries waiting in the frontier
    pub queued: usize,
    /// Distinct URLs accepted by the frontier so far
    pub visited: usize,
    pub stats: StatsResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RunPagesResponse {
    pub run_id: Uuid,
    pub total: usize,
    pub pages: Vec<PageResponse>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Crawl runs currently in progress
    pub active_runs: usize,
}
