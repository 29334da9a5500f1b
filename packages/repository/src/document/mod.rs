//! Document-database report store.
//!
//! Each report is one document, keyed by its id, in a named collection. The
//! database itself sits behind [`DocumentCollection`], a small seam covering
//! the four calls the store makes. [`firestore::FirestoreCollection`] is the
//! production implementation.
//!
//! Listing pushes the status/category equality filters and the `createdAt`
//! descending order down to the database. Bounding-box filtering cannot be
//! expressed with simple equality/order queries, so it runs client side;
//! for the same reason the limit is only pushed down when no bbox is
//! requested. If the database rejects the pushed-down query (typically a
//! missing composite index), the store falls back to scanning the whole
//! collection and applies everything client side.
//!
//! Ordering by `createdAt` on the server drops documents that lack the
//! field entirely, whereas the other stores list such records last. Every
//! report written through this store carries `createdAt`, so only documents
//! inserted by other means are affected; a fallback scan still returns them.
//!
//! Updates read the current document, normalize the merge in memory, and
//! merge-write only the patched fields in canonical form. The stored values
//! therefore match what the equality filters compare against, and an
//! invalid coordinate clears both coordinates as it does elsewhere. The
//! read and the write are not transactional.

pub mod firestore;
pub mod value;

use citizen_map_report_models::{ListOptions, Report, ReportPatch, normalize_object};
use serde_json::{Map, Value};

use crate::query::select_reports;
use crate::{BackendKind, ReportStore, StoreError};

/// Field reports are ordered by.
pub const ORDER_FIELD: &str = "createdAt";

/// A stored document: its id plus plain-JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id (the report id).
    pub id: String,
    /// Decoded fields.
    pub fields: Map<String, Value>,
}

/// An equality condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field path.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

/// A query the database evaluates server side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    /// Conditions combined with AND.
    pub filters: Vec<FieldFilter>,
    /// Field to order by, descending.
    pub order_by_desc: Option<String>,
    /// Maximum number of documents.
    pub limit: Option<usize>,
}

impl DocumentQuery {
    /// Builds the pushed-down query for a listing.
    #[must_use]
    pub fn for_listing(options: &ListOptions) -> Self {
        let mut filters = Vec::new();
        if let Some(status) = &options.status {
            filters.push(FieldFilter {
                field: "status".to_string(),
                value: Value::from(status.as_str()),
            });
        }
        if let Some(category) = &options.category {
            filters.push(FieldFilter {
                field: "category".to_string(),
                value: Value::from(category.as_str()),
            });
        }

        Self {
            filters,
            order_by_desc: Some(ORDER_FIELD.to_string()),
            limit: options.bbox.is_none().then(|| options.effective_limit()),
        }
    }

    /// Whether this query asks for nothing beyond a full scan.
    #[must_use]
    pub fn is_scan(&self) -> bool {
        self.filters.is_empty() && self.order_by_desc.is_none() && self.limit.is_none()
    }
}

/// Minimal document-database interface used by [`DocumentReportStore`].
#[async_trait::async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Writes a document, replacing any existing one with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn set(&self, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError>;

    /// Reads a document by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merges `fields` into an existing document and returns the result.
    /// Returns `None` (and writes nothing) when the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn merge(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<Document>, StoreError>;

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database rejects or fails the query.
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, StoreError>;
}

/// Document-database [`ReportStore`].
pub struct DocumentReportStore {
    collection: Box<dyn DocumentCollection>,
}

impl DocumentReportStore {
    /// Creates a store on top of `collection`.
    #[must_use]
    pub fn new(collection: Box<dyn DocumentCollection>) -> Self {
        Self { collection }
    }
}

/// Normalizes a document, taking the id from the document key when the
/// stored fields lack one.
fn to_report(document: Document) -> Report {
    let mut report = normalize_object(&document.fields);
    if report.id.is_empty() {
        report.id = document.id;
    }
    report
}

#[async_trait::async_trait]
impl ReportStore for DocumentReportStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        let Value::Object(fields) = report.to_value() else {
            return Err(StoreError::Backend {
                message: "report did not serialize to an object".to_string(),
            });
        };
        self.collection.set(&report.id, &fields).await?;
        Ok(report)
    }

    async fn list_reports(&self, options: &ListOptions) -> Result<Vec<Report>, StoreError> {
        let query = DocumentQuery::for_listing(options);
        let documents = match self.collection.query(&query).await {
            Ok(documents) => documents,
            Err(e) if !query.is_scan() => {
                log::warn!(
                    "Query on collection '{}' rejected ({e}); falling back to a full scan",
                    self.collection.name()
                );
                self.collection.query(&DocumentQuery::default()).await?
            }
            Err(e) => return Err(e),
        };

        // Re-applying the pushed-down filters is a no-op on the happy path and
        // does all the work after a fallback scan. The sort is stable, so the
        // server's order among equal timestamps is kept.
        Ok(select_reports(documents.into_iter().map(to_report), options))
    }

    async fn get_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.collection.get(id).await?.map(to_report))
    }

    async fn update_report(
        &self,
        id: &str,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, StoreError> {
        let Some(existing) = self.collection.get(id).await?.map(to_report) else {
            return Ok(None);
        };
        Ok(self
            .collection
            .merge(id, &patch.canonical_fields(&existing))
            .await?
            .map(to_report))
    }
}
