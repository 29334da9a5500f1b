//! Process-local report store.
//!
//! Keeps reports in insertion order inside the process. Nothing is
//! persisted; the store is empty on every start. Useful for tests, demos,
//! and deployments that treat reports as disposable.

use citizen_map_report_models::{ListOptions, Report, ReportPatch};
use tokio::sync::RwLock;

use crate::query::select_reports;
use crate::{BackendKind, ReportStore, StoreError};

/// In-memory [`ReportStore`].
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<Vec<Report>>,
}

impl MemoryReportStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports.
    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    /// Whether the store holds no reports.
    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryReportStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn create_report(&self, report: Report) -> Result<Report, StoreError> {
        self.reports.write().await.push(report.clone());
        Ok(report)
    }

    async fn list_reports(&self, options: &ListOptions) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.read().await;
        Ok(select_reports(reports.iter().cloned(), options))
    }

    async fn get_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
        let reports = self.reports.read().await;
        Ok(reports.iter().find(|r| r.id == id).cloned())
    }

    async fn update_report(
        &self,
        id: &str,
        patch: &ReportPatch,
    ) -> Result<Option<Report>, StoreError> {
        let mut reports = self.reports.write().await;
        let Some(existing) = reports.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        *existing = patch.merge_into(existing);
        Ok(Some(existing.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citizen_map_report_models::NewReport;

    fn report(id: &str, created_at: &str) -> Report {
        NewReport::new()
            .category("green")
            .description(format!("report {id}"))
            .into_report(id.to_string(), created_at)
    }

    #[tokio::test]
    async fn create_keeps_duplicates_and_order() {
        let store = MemoryReportStore::new();
        let first = report("same", "2026-01-01T00:00:00.000000Z");
        store.create_report(first.clone()).await.unwrap();
        store.create_report(first.clone()).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn get_and_update_unknown_ids() {
        let store = MemoryReportStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get_report("missing").await.unwrap(), None);
        let patch = ReportPatch::new().status("validated");
        assert_eq!(store.update_report("missing", &patch).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_merges_in_place() {
        let store = MemoryReportStore::new();
        store
            .create_report(report("a", "2026-01-01T00:00:00.000000Z"))
            .await
            .unwrap();

        let patch = ReportPatch::new()
            .status("validated")
            .stamped("2026-01-02T00:00:00.000000Z");
        let updated = store.update_report("a", &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, "validated");
        assert_eq!(updated.description, "report a");

        let fetched = store.get_report("a").await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }
}
