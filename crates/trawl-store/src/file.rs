use std::fmt;
use std::path::Path;
use std::str::FromStr;

use trawl_core::error::AppError;
use trawl_core::models::PageRecord;
use trawl_core::traits::PageStore;

use crate::csv_store::CsvStore;
use crate::json_store::JsonStore;

/// File format for crawl output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    /// Format implied by the file extension, if it is a known one.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(AppError::ConfigError(format!(
                "unsupported output format '{other}' (expected json or csv)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Csv => f.write_str("csv"),
        }
    }
}

/// A file-backed store of either format.
#[derive(Debug, Clone)]
pub enum FileStore {
    Json(JsonStore),
    Csv(CsvStore),
}

impl FileStore {
    pub fn create(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self, AppError> {
        Ok(match format {
            OutputFormat::Json => Self::Json(JsonStore::create(path)?),
            OutputFormat::Csv => Self::Csv(CsvStore::create(path)?),
        })
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Json(_) => OutputFormat::Json,
            Self::Csv(_) => OutputFormat::Csv,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Json(store) => store.path(),
            Self::Csv(store) => store.path(),
        }
    }
}

impl PageStore for FileStore {
    async fn save(&self, record: &PageRecord) -> Result<(), AppError> {
        match self {
            Self::Json(store) => store.save(record).await,
            Self::Csv(store) => store.save(record).await,
        }
    }

    async fn close(&self) -> Result<(), AppError> {
        match self {
            Self::Json(store) => store.close().await,
            Self::Csv(store) => store.close().await,
        }
    }
}
