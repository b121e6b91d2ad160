use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_USER_AGENT: &str = "Trawl/1.0";

/// Settings for a single crawl run. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Pages deeper than this are discarded. Seeds are depth 0.
    pub max_depth: u32,
    pub workers: usize,
    /// Minimum gap between two request starts on the same host.
    pub delay: Duration,
    pub timeout: Duration,
    /// Page budget; 0 means unbounded.
    pub max_pages: u64,
    pub respect_robots: bool,
    pub news_mode: bool,
    /// Surface skipped and failed URLs at info/warn instead of debug.
    pub verbose: bool,
    /// Only follow links whose host matches the page they were found on.
    pub stay_on_domain: bool,
    /// Only follow links containing this substring.
    pub url_filter: Option<String>,
    /// Fetch the seeds and nothing else.
    pub seed_only: bool,
    /// Persist discovered links with each page record.
    pub extract_links: bool,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            workers: 2,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            max_pages: 20,
            respect_robots: true,
            news_mode: false,
            verbose: false,
            stay_on_domain: true,
            url_filter: None,
            seed_only: false,
            extract_links: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    pub fn with_news_mode(mut self, news_mode: bool) -> Self {
        self.news_mode = news_mode;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_stay_on_domain(mut self, stay: bool) -> Self {
        self.stay_on_domain = stay;
        self
    }

    /// Empty filters are treated as no filter.
    pub fn with_url_filter(mut self, filter: Option<String>) -> Self {
        self.url_filter = filter.filter(|f| !f.is_empty());
        self
    }

    pub fn with_seed_only(mut self, seed_only: bool) -> Self {
        self.seed_only = seed_only;
        self
    }

    pub fn with_extract_links(mut self, extract: bool) -> Self {
        self.extract_links = extract;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.workers == 0 {
            return Err(AppError::ConfigError(
                "workers must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(AppError::ConfigError(
                "timeout must be greater than zero".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::ConfigError("user agent must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sensible() {
        let config = CrawlConfig::default();
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.workers, 2);
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.max_pages, 20);
        assert!(config.respect_robots);
        assert!(config.stay_on_domain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_filter_is_dropped() {
        let config = CrawlConfig::default().with_url_filter(Some(String::new()));
        assert!(config.url_filter.is_none());
        let config = CrawlConfig::default().with_url_filter(Some("/wiki/".into()));
        assert_eq!(config.url_filter.as_deref(), Some("/wiki/"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(CrawlConfig::default().with_workers(0).validate().is_err());
        assert!(
            CrawlConfig::default()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            CrawlConfig::default()
                .with_user_agent("  ")
                .validate()
                .is_err()
        );
    }
}
