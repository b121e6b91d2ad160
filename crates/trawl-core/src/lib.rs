pub mod config;
pub mod crawler;
pub mod error;
pub mod frontier;
pub mod lifecycle;
pub mod models;
pub mod reporter;
pub mod robots;
pub mod throttle;
pub mod traits;
pub mod util;

#[cfg(test)]
pub mod testutil;

pub use config::{CrawlConfig, DEFAULT_USER_AGENT};
pub use crawler::{CrawlHandle, Crawler};
pub use error::AppError;
pub use models::{FetchedPage, PageRecord, ParseOptions, ParsedPage, RunStats};
pub use reporter::{CrawlEvent, CrawlReporter, SilentReporter, StopReason, TracingReporter};
pub use traits::{Fetcher, NullStore, PageParser, PageStore};
