#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report persistence with interchangeable storage backends.
//!
//! Three adapters implement [`ReportStore`]:
//!
//! - [`memory::MemoryReportStore`]: process-local, nothing survives a restart
//! - [`file::FileReportStore`]: a single JSON array on disk
//! - [`document::DocumentReportStore`]: one document per report in a
//!   document database (Cloud Firestore via its REST API)
//!
//! Callers never pick an adapter directly. They hold a
//! [`ReportRepository`], which resolves the backend once from
//! [`RepositoryConfig`] (see [`selector`]) and normalizes everything it
//! returns.

pub mod config;
pub mod document;
pub mod file;
pub mod memory;
pub mod paths;
pub mod query;
pub mod repository;
pub mod selector;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;

use citizen_map_report_models::{ListOptions, Report, ReportPatch};

pub use config::{BackendKind, ConfigError, DocumentDbConfig, RepositoryConfig};
pub use repository::ReportRepository;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request to a remote backend failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },

    /// Stored data could not be parsed.
    #[error("Corrupt data in {}: {message}", .path.display())]
    CorruptData {
        /// File holding the unparseable data.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Errors that prevent the repository from resolving a backend.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The configuration cannot produce a backend.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// The backend failed to initialize.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Storage contract shared by every backend.
///
/// All implementations observe the same semantics:
///
/// - `create_report` persists a fully stamped record as-is (no reordering,
///   no deduplication) and returns it.
/// - `list_reports` filters by status, category, and bounding box, sorts by
///   `createdAt` descending (ties keep storage order), then truncates to the
///   clamped limit. See [`query::select_reports`].
/// - `get_report` returns `None` for unknown ids.
/// - `update_report` shallow-merges the patch and returns `None` for unknown
///   ids.
///
/// Implementations do not retry. Errors are returned as-is; the
/// [`ReportRepository`] decides which ones are absorbed.
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Persists a new report.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the report could not be written.
    async fn create_report(&self, report: Report) -> Result<Report, StoreError>;

    /// Lists reports matching `options`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend could not be read.
    async fn list_reports(&self, options: &ListOptions) -> Result<Vec<Report>, StoreError>;

    /// Fetches one report by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend could not be read.
    async fn get_report(&self, id: &str) -> Result<Option<Report>, StoreError>;

    /// Merges `patch` into the report with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the report could not be read or written.
    async fn update_report(
        &self,
        id: &str,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, StoreError>;
}
