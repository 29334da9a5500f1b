//! Backend selection.
//!
//! Policy, evaluated once per [`crate::ReportRepository`]:
//!
//! 1. An explicit `memory` or `file` strategy is used as-is.
//! 2. An explicit `document` strategy is used when a project id and either
//!    an access token or an emulator host are configured. Otherwise the
//!    file-backed store is used instead and a warning is logged; missing
//!    optional infrastructure never stops the process from starting.
//! 3. No explicit strategy selects the file-backed store, which needs no
//!    configuration at all.

use std::sync::Arc;

use crate::document::DocumentReportStore;
use crate::document::firestore::FirestoreCollection;
use crate::file::FileReportStore;
use crate::memory::MemoryReportStore;
use crate::{BackendKind, RepositoryConfig, RepositoryError, ReportStore};

/// The adapter a repository resolved to.
#[derive(Clone)]
pub struct SelectedBackend {
    /// Which strategy was chosen.
    pub kind: BackendKind,
    /// The adapter instance.
    pub store: Arc<dyn ReportStore>,
}

impl std::fmt::Debug for SelectedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedBackend")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Decides which strategy `config` resolves to, applying the fallback
/// policy. Logs a warning when a requested document database is not
/// reachable.
#[must_use]
pub fn resolve_kind(config: &RepositoryConfig) -> BackendKind {
    match config.backend {
        Some(BackendKind::Memory) => BackendKind::Memory,
        Some(BackendKind::Document) if config.document.is_reachable() => BackendKind::Document,
        Some(BackendKind::Document) => {
            log::warn!(
                "Document backend requested but no Firestore project/credentials are \
                 configured (set FIRESTORE_PROJECT_ID plus FIRESTORE_ACCESS_TOKEN or \
                 FIRESTORE_EMULATOR_HOST). Falling back to the file store at {}",
                config.data_file.display()
            );
            BackendKind::File
        }
        Some(BackendKind::File) | None => BackendKind::File,
    }
}

/// Instantiates the adapter `config` resolves to.
///
/// # Errors
///
/// Returns [`RepositoryError::Config`] if the document backend is selected
/// without a collection name, or [`RepositoryError::Store`] if its client
/// cannot be constructed.
pub fn select_backend(config: &RepositoryConfig) -> Result<SelectedBackend, RepositoryError> {
    let kind = resolve_kind(config);

    let store: Arc<dyn ReportStore> = match kind {
        BackendKind::Memory => {
            log::info!("Using in-memory report store (reports are not persisted)");
            Arc::new(MemoryReportStore::new())
        }
        BackendKind::File => {
            log::info!("Using file report store at {}", config.data_file.display());
            Arc::new(FileReportStore::new(config.data_file.clone()))
        }
        BackendKind::Document => {
            if config.collection.trim().is_empty() {
                return Err(RepositoryError::Config {
                    message: "document backend needs a non-empty collection name".to_string(),
                });
            }
            let collection = FirestoreCollection::new(&config.document, &config.collection)?;
            log::info!(
                "Using document report store (collection '{}')",
                config.collection
            );
            Arc::new(DocumentReportStore::new(Box::new(collection)))
        }
    };

    Ok(SelectedBackend { kind, store })
}
