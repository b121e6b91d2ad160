use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{FetchedPage, PageRecord, ParseOptions, ParsedPage};

/// Downloads a resource over HTTP.
///
/// User agent and timeout are properties of the implementation. The
/// returned future must resolve promptly with [`AppError::Cancelled`]
/// once `cancel` fires.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Turns raw markup into title, description, body text and outbound links.
pub trait PageParser: Send + Sync + Clone {
    fn parse(
        &self,
        html: &str,
        base_url: &str,
        options: &ParseOptions,
    ) -> Result<ParsedPage, AppError>;
}

/// Persists crawl results.
pub trait PageStore: Send + Sync + Clone {
    fn save(&self, record: &PageRecord) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Flush and finalize. Called once when the run ends.
    fn close(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op PageStore for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullStore;

impl PageStore for NullStore {
    async fn save(&self, _record: &PageRecord) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}
