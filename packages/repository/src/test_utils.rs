//! Shared fixtures for backend tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use citizen_map_report_models::{ListOptions, NewReport, Report, ReportPatch};
use serde_json::{Map, Value};

use crate::document::{Document, DocumentCollection, DocumentQuery};
use crate::{BackendKind, ReportStore, StoreError};

/// Scratch directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{name}_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// An open heat report with a fixed id and timestamp.
pub fn fixed_report(id: &str, created_at: &str) -> Report {
    NewReport::new()
        .category("heat")
        .description(format!("report {id}"))
        .into_report(id.to_string(), created_at)
}

#[derive(Default)]
struct CollectionState {
    documents: Vec<Document>,
    reject_filtered: bool,
    scans: usize,
}

/// [`DocumentCollection`] held in memory. Clones share state, so a test can
/// keep a handle after boxing one into a store.
#[derive(Clone)]
pub struct InMemoryCollection {
    name: String,
    state: Arc<Mutex<CollectionState>>,
}

impl InMemoryCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::default(),
        }
    }

    /// Fails every query other than a plain scan, like a database missing
    /// the composite index a filtered query needs.
    pub fn rejecting_filtered_queries(self) -> Self {
        self.state().reject_filtered = true;
        self
    }

    pub fn scan_count(&self) -> usize {
        self.state().scans
    }

    pub fn len(&self) -> usize {
        self.state().documents.len()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn order_key<'a>(document: &'a Document, field: &str) -> &'a str {
    document
        .fields
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set(&self, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let document = Document {
            id: id.to_string(),
            fields: fields.clone(),
        };
        let mut state = self.state();
        match state.documents.iter_mut().find(|d| d.id == id) {
            Some(existing) => *existing = document,
            None => state.documents.push(document),
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.state().documents.iter().find(|d| d.id == id).cloned())
    }

    async fn merge(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<Document>, StoreError> {
        let mut state = self.state();
        let Some(existing) = state.documents.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        existing.fields.extend(fields.clone());
        Ok(Some(existing.clone()))
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError> {
        let mut state = self.state();
        if query.is_scan() {
            state.scans += 1;
        } else if state.reject_filtered {
            return Err(StoreError::Backend {
                message: "FAILED_PRECONDITION: the query requires an index".to_string(),
            });
        }

        let mut documents: Vec<Document> = state
            .documents
            .iter()
            .filter(|d| {
                query
                    .filters
                    .iter()
                    .all(|f| d.fields.get(&f.field) == Some(&f.value))
            })
            .cloned()
            .collect();
        drop(state);

        if let Some(field) = &query.order_by_desc {
            documents.sort_by(|a, b| order_key(b, field).cmp(order_key(a, field)));
        }
        if let Some(limit) = query.limit {
            documents.truncate(limit);
        }
        Ok(documents)
    }
}

/// A [`ReportStore`] whose every call fails. Counts the calls it receives.
#[derive(Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

impl FailingStore {
    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Backend {
            message: "backend offline".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ReportStore for FailingStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn create_report(&self, _report: Report) -> Result<Report, StoreError> {
        self.fail()
    }

    async fn list_reports(&self, _options: &ListOptions) -> Result<Vec<Report>, StoreError> {
        self.fail()
    }

    async fn get_report(&self, _id: &str) -> Result<Option<Report>, StoreError> {
        self.fail()
    }

    async fn update_report(
        &self,
        _id: &str,
        _patch: &ReportPatch,
    ) -> Result<Option<Report>, StoreError> {
        self.fail()
    }
}
