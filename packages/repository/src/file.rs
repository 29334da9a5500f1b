//! JSON-file report store.
//!
//! All reports live in a single JSON array (pretty printed, one canonical
//! report object per element). The file and its parent directories are
//! created on first access.
//!
//! Every mutation reads the whole file, changes it in memory, and writes the
//! whole file back. The write goes to a sibling `.tmp` file that is then
//! renamed over the original, so readers only ever see a complete array.
//! Mutations made through one [`FileReportStore`] are serialized by an
//! in-process mutex; separate processes writing the same file are not
//! coordinated and can lose updates.
//!
//! Reads favor availability: an unreadable or unparseable file lists as an
//! empty collection. Writes do not: a mutation refuses to replace a file it
//! cannot parse, so corrupt contents are left in place for inspection.

use std::path::{Path, PathBuf};

use citizen_map_report_models::{ListOptions, Report, ReportPatch, normalize_report};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;

use crate::paths::staging_path;
use crate::query::select_reports;
use crate::{BackendKind, ReportStore, StoreError};

/// File-backed [`ReportStore`].
#[derive(Debug)]
pub struct FileReportStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileReportStore {
    /// Creates a store backed by the JSON file at `path`. Nothing is touched
    /// on disk until the first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the backing file if it does not exist yet.
    async fn ensure_file(&self) -> Result<(), StoreError> {
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        self.create_if_missing().await
    }

    /// Creates parent directories and an empty array. Caller holds the
    /// write lock.
    async fn create_if_missing(&self) -> Result<(), StoreError> {
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        log::debug!("Creating report store at {}", self.path.display());
        self.write_reports(&[]).await
    }

    async fn read_reports(&self) -> Result<StoredReports, StoreError> {
        let text = fs::read_to_string(&self.path).await?;
        parse_reports(&self.path, &text)
    }

    /// Write path: strict read. Entries that cannot be kept are reported,
    /// since the write that follows drops them from disk.
    async fn read_for_write(&self) -> Result<Vec<Report>, StoreError> {
        let stored = self.read_reports().await?;
        if stored.skipped > 0 {
            log::warn!(
                "Dropping {} non-object entries from {} on rewrite",
                stored.skipped,
                self.path.display()
            );
        }
        Ok(stored.reports)
    }

    /// Read path: any failure degrades to an empty collection.
    async fn load_reports(&self) -> Vec<Report> {
        let result = match self.ensure_file().await {
            Ok(()) => self.read_reports().await.map(|stored| stored.reports),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            log::warn!(
                "Treating report store {} as empty: {e}",
                self.path.display()
            );
            Vec::new()
        })
    }

    /// Replaces the file contents with `reports`. Caller holds the write
    /// lock.
    async fn write_reports(&self, reports: &[Report]) -> Result<(), StoreError> {
        let staged = staging_path(&self.path);
        let json = serde_json::to_vec_pretty(reports)?;
        fs::write(&staged, json).await?;
        fs::rename(&staged, &self.path).await?;
        Ok(())
    }
}

/// Parsed contents of a store file.
#[derive(Debug, Default)]
struct StoredReports {
    reports: Vec<Report>,
    /// Array elements that were not objects.
    skipped: usize,
}

/// Parses store file contents.
///
/// Whitespace-only text is an empty collection. Anything that is not a JSON
/// array is [`StoreError::CorruptData`]. Array elements that are not objects
/// are counted and skipped.
fn parse_reports(path: &Path, text: &str) -> Result<StoredReports, StoreError> {
    if text.trim().is_empty() {
        return Ok(StoredReports::default());
    }

    let value: Value = serde_json::from_str(text).map_err(|e| StoreError::CorruptData {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let Value::Array(items) = value else {
        return Err(StoreError::CorruptData {
            path: path.to_path_buf(),
            message: "expected a JSON array of reports".to_string(),
        });
    };

    let reports: Vec<Report> = items.iter().filter_map(normalize_report).collect();
    Ok(StoredReports {
        skipped: items.len() - reports.len(),
        reports,
    })
}

#[async_trait::async_trait]
impl ReportStore for FileReportStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.create_if_missing().await?;

        let mut reports = self.read_for_write().await?;
        reports.push(report.clone());
        self.write_reports(&reports).await?;

        log::debug!(
            "Stored report {} ({} total) in {}",
            report.id,
            reports.len(),
            self.path.display()
        );
        Ok(report)
    }

    async fn list_reports(&self, options: &ListOptions) -> Result<Vec<Report>, StoreError> {
        Ok(select_reports(self.load_reports().await, options))
    }

    async fn get_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.load_reports().await.into_iter().find(|r| r.id == id))
    }

    async fn update_report(
        &self,
        id: &str,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.create_if_missing().await?;

        let mut reports = self.read_for_write().await?;
        let Some(existing) = reports.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        *existing = patch.merge_into(existing);
        let updated = existing.clone();

        self.write_reports(&reports).await?;
        Ok(Some(updated))
    }
}
