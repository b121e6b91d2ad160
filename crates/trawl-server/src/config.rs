use std::net::SocketAddr;

use trawl_core::error::AppError;

pub const DEFAULT_PORT: u16 = 3000;

/// Server settings, read from `TRAWL_SERVER_PORT`, `TRAWL_API_KEY` and
/// `TRAWL_ALLOW_PRIVATE_URLS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Bearer token required on `/v1` routes. `None` leaves them open.
    pub api_key: Option<String>,
    /// Let crawls reach loopback and private-network addresses.
    pub allow_private_urls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            api_key: None,
            allow_private_urls: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = match lookup("TRAWL_SERVER_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!("TRAWL_SERVER_PORT is not a valid port: '{raw}'"))
            })?,
            None => DEFAULT_PORT,
        };

        let api_key = lookup("TRAWL_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let allow_private_urls = lookup("TRAWL_ALLOW_PRIVATE_URLS")
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Self {
            port,
            api_key,
            allow_private_urls,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
