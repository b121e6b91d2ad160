//! Per-host robots.txt cache.
//!
//! The matcher is intentionally simpler than RFC 9309: rules are plain path
//! prefixes (no `*` or `$`), and within an agent's group the **first** rule in
//! document order that matches wins, not the longest one. A site that relies
//! on longest-match precedence (e.g. `Disallow: /` followed by `Allow: /pub`)
//! is therefore read as "everything disallowed".
//!
//! Whenever robots.txt cannot be obtained the cache fails open: the host is
//! treated as allowing everything with the default crawl delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::traits::Fetcher;

/// How long a fetched robots.txt is trusted.
pub const ROBOTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Crawl delay used when robots.txt is missing or does not set one.
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(1);

const MAX_CACHED_HOSTS: u64 = 10_000;

/// One `Allow`/`Disallow` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub prefix: String,
    pub allow: bool,
}

/// Parsed robots.txt for one host.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Lower-cased user-agent token to its rules, in document order.
    rules: HashMap<String, Vec<Rule>>,
    crawl_delay: Duration,
}

impl RobotsPolicy {
    /// Allow-all policy with the default delay.
    pub fn permissive() -> Self {
        Self {
            rules: HashMap::new(),
            crawl_delay: DEFAULT_CRAWL_DELAY,
        }
    }

    /// Parse a robots.txt document.
    pub fn parse(content: &str) -> Self {
        let mut policy = Self::permissive();
        let mut current_agent: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    let agent = value.to_ascii_lowercase();
                    policy.rules.entry(agent.clone()).or_default();
                    current_agent = Some(agent);
                }
                "allow" | "disallow" => {
                    if let Some(agent) = &current_agent
                        && !value.is_empty()
                    {
                        policy.rules.entry(agent.clone()).or_default().push(Rule {
                            prefix: value.to_string(),
                            allow: field == "allow",
                        });
                    }
                }
                "crawl-delay" => {
                    if let Some(delay) = parse_delay(value) {
                        policy.crawl_delay = delay;
                    }
                }
                _ => {}
            }
        }

        policy
    }

    pub fn crawl_delay(&self) -> Duration {
        self.crawl_delay
    }

    pub fn rules_for(&self, user_agent: &str) -> Option<&[Rule]> {
        self.rules
            .get(&user_agent.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Check `path` for `user_agent`, falling back to the `*` group.
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        self.first_match(path, user_agent)
            .or_else(|| self.first_match(path, "*"))
            .unwrap_or(true)
    }

    fn first_match(&self, path: &str, user_agent: &str) -> Option<bool> {
        self.rules_for(user_agent)?
            .iter()
            .find(|rule| path.starts_with(&rule.prefix))
            .map(|rule| rule.allow)
    }
}

/// `Crawl-delay` value in seconds; fractions allowed, must be positive.
fn parse_delay(value: &str) -> Option<Duration> {
    let secs: f64 = value.parse().ok()?;
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Outcome of trying to obtain a host's robots.txt.
#[derive(Debug)]
pub enum PolicyFetch {
    Fetched(RobotsPolicy),
    /// Network error, non-success status or unreadable body.
    Unavailable(RobotsPolicy),
}

impl PolicyFetch {
    pub fn into_policy(self) -> RobotsPolicy {
        match self {
            PolicyFetch::Fetched(policy) | PolicyFetch::Unavailable(policy) => policy,
        }
    }
}

/// Answer from [`RobotsCache::is_allowed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    /// Delay requested by the site (or the default).
    pub crawl_delay: Duration,
}

/// Caches one [`RobotsPolicy`] per `scheme://host[:port]` for [`ROBOTS_TTL`].
///
/// Concurrent misses for the same host are coalesced into one fetch.
#[derive(Clone)]
pub struct RobotsCache<F> {
    fetcher: F,
    cache: Cache<String, Arc<RobotsPolicy>>,
    cancel: CancellationToken,
}

impl<F: Fetcher> RobotsCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_ttl(fetcher, ROBOTS_TTL)
    }

    pub fn with_ttl(fetcher: F, ttl: Duration) -> Self {
        Self {
            fetcher,
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_HOSTS)
                .time_to_live(ttl)
                .build(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight robots.txt fetches when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Decide whether `url` may be fetched by `user_agent`.
    ///
    /// Only a malformed `url` is an error; robots.txt fetch failures are
    /// absorbed as an allow-all policy.
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> Result<PolicyDecision, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::invalid_url(url, e))?;
        if !parsed.has_host() {
            return Err(AppError::invalid_url(url, "URL has no host"));
        }
        let host = parsed.origin().ascii_serialization();

        let policy = self
            .cache
            .get_with(host.clone(), async {
                Arc::new(self.fetch_policy(&host).await.into_policy())
            })
            .await;

        Ok(PolicyDecision {
            allowed: policy.is_allowed(parsed.path(), user_agent),
            crawl_delay: policy.crawl_delay(),
        })
    }

    async fn fetch_policy(&self, host: &str) -> PolicyFetch {
        let robots_url = format!("{host}/robots.txt");

        match self.fetcher.fetch(&robots_url, &self.cancel).await {
            Ok(page) if page.is_success() => {
                tracing::debug!(%host, bytes = page.body.len(), "Fetched robots.txt");
                PolicyFetch::Fetched(RobotsPolicy::parse(&page.body))
            }
            Ok(page) => {
                tracing::debug!(%host, status = page.status, "No usable robots.txt, allowing all");
                PolicyFetch::Unavailable(RobotsPolicy::permissive())
            }
            Err(e) => {
                tracing::debug!(%host, error = %e, "robots.txt fetch failed, allowing all");
                PolicyFetch::Unavailable(RobotsPolicy::permissive())
            }
        }
    }
}
