use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use trawl_core::error::AppError;
use trawl_core::models::PageRecord;
use trawl_core::traits::PageStore;

const HEADER: [&str; 7] = [
    "url",
    "title",
    "description",
    "content",
    "links",
    "crawled_at",
    "depth",
];

#[derive(Debug, Serialize)]
struct CsvRow {
    url: String,
    title: String,
    description: String,
    content: String,
    /// Comma-joined.
    links: String,
    /// RFC 3339.
    crawled_at: String,
    depth: u32,
}

impl From<&PageRecord> for CsvRow {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            content: record.content.clone().unwrap_or_default(),
            links: record.links.join(","),
            crawled_at: record.crawled_at.to_rfc3339(),
            depth: record.depth,
        }
    }
}

type Writer = csv::Writer<File>;

/// Appends one CSV row per record and flushes after every row, so partial
/// results survive an interrupted run.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    /// `None` once closed.
    writer: Arc<Mutex<Option<Writer>>>,
}

fn lock_writer(writer: &Mutex<Option<Writer>>) -> MutexGuard<'_, Option<Writer>> {
    writer.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered from poisoned CSV writer mutex");
        poisoned.into_inner()
    })
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::StorageError(format!("CSV write failed: {e}"))
}

impl CsvStore {
    /// Create (or truncate) the file and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_error)?;
        writer.write_record(HEADER).map_err(csv_error)?;
        writer.flush()?;

        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the open writer on the blocking pool.
    async fn with_writer<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Option<Writer>) -> Result<T, AppError> + Send + 'static,
    {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || f(&mut lock_writer(&writer)))
            .await
            .map_err(|e| AppError::StorageError(format!("CSV writer task failed: {e}")))?
    }
}

impl PageStore for CsvStore {
    async fn save(&self, record: &PageRecord) -> Result<(), AppError> {
        let row = CsvRow::from(record);
        let path = self.path.display().to_string();
        self.with_writer(move |writer| {
            let writer = writer
                .as_mut()
                .ok_or_else(|| AppError::StorageError(format!("{path} is already closed")))?;
            writer.serialize(row).map_err(csv_error)?;
            writer.flush()?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), AppError> {
        self.with_writer(|writer| {
            if let Some(mut w) = writer.take() {
                w.flush()?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record() -> PageRecord {
        PageRecord {
            url: "http://a.test/".into(),
            title: "Hello, world".into(),
            description: "Desc".into(),
            content: None,
            links: vec!["http://a.test/x".into(), "http://a.test/y".into()],
            crawled_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            depth: 0,
        }
    }

    #[tokio::test]
    async fn test_header_written_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let store = CsvStore::create(&path).unwrap();
        store.close().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "url,title,description,content,links,crawled_at,depth\n"
        );
    }

    #[tokio::test]
    async fn test_rows_are_flushed_per_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let store = CsvStore::create(&path).unwrap();

        store.save(&record()).await.unwrap();
        // Visible before close.
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "http://a.test/");
        assert_eq!(&rows[0][1], "Hello, world");
        assert_eq!(&rows[0][3], "");
        assert_eq!(&rows[0][4], "http://a.test/x,http://a.test/y");
        assert_eq!(&rows[0][5], "2024-05-01T12:00:00+00:00");
        assert_eq!(&rows[0][6], "0");
    }

    #[tokio::test]
    async fn test_save_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::create(dir.path().join("out.csv")).unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();

        let err = store.save(&record()).await.unwrap_err();
        assert!(matches!(err, AppError::StorageError(_)));
    }
}
