//! The repository facade.
//!
//! [`ReportRepository`] is the single entry point for report persistence.
//! Construct one at startup and clone it into every consumer; clones share
//! the same backend.
//!
//! The backend is resolved lazily on first use. Concurrent first calls wait
//! on the same in-flight resolution, so exactly one adapter is built per
//! repository and the choice never changes afterwards.
//!
//! Nothing here returns an error. Mutations that fail are logged and come
//! back as `None` ("not applied"). Reads that fail are logged and come back
//! empty, indistinguishable from "no matches" (see [`absorb_read_failure`]).

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, SubsecRound as _, TimeDelta, Utc};
use citizen_map_report_models::{ListOptions, NewReport, Report, ReportPatch, normalize_report};
use tokio::sync::OnceCell;

use crate::selector::{SelectedBackend, select_backend};
use crate::{BackendKind, RepositoryConfig, RepositoryError, ReportStore, StoreError};

/// Handle to report persistence.
#[derive(Clone)]
pub struct ReportRepository {
    inner: Arc<Inner>,
}

struct Inner {
    config: RepositoryConfig,
    backend: OnceCell<SelectedBackend>,
    clock: Timestamper,
}

impl std::fmt::Debug for ReportRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRepository")
            .field("config", &self.inner.config)
            .field("backend", &self.inner.backend.get())
            .finish_non_exhaustive()
    }
}

impl ReportRepository {
    /// Creates a repository that resolves its backend from `config` on
    /// first use.
    #[must_use]
    pub fn new(config: RepositoryConfig) -> Self {
        Self::from_parts(config, OnceCell::new())
    }

    /// Creates a repository around an already-built adapter.
    #[must_use]
    pub fn with_store(store: Arc<dyn ReportStore>) -> Self {
        let selected = SelectedBackend {
            kind: store.kind(),
            store,
        };
        Self::from_parts(RepositoryConfig::default(), OnceCell::new_with(Some(selected)))
    }

    fn from_parts(config: RepositoryConfig, backend: OnceCell<SelectedBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                clock: Timestamper::default(),
            }),
        }
    }

    /// Resolves the backend, building it on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the backend cannot be constructed. A
    /// failed resolution is retried by the next call.
    pub async fn backend(&self) -> Result<&SelectedBackend, RepositoryError> {
        self.inner
            .backend
            .get_or_try_init(|| async { select_backend(&self.inner.config) })
            .await
    }

    /// Which backend this repository uses, resolving it if necessary.
    pub async fn backend_kind(&self) -> Option<BackendKind> {
        self.resolved("resolve backend").await.map(|b| b.kind)
    }

    async fn resolved(&self, operation: &str) -> Option<&SelectedBackend> {
        match self.backend().await {
            Ok(backend) => Some(backend),
            Err(e) => {
                log::warn!("Cannot {operation}: no report backend available: {e}");
                None
            }
        }
    }

    /// Creates a report.
    ///
    /// Stamps a fresh id, `createdAt == updatedAt`, and the default status
    /// and source. Returns `None` if the report was not persisted.
    pub async fn create_report(&self, payload: NewReport) -> Option<Report> {
        let backend = self.resolved("create report").await?;

        let timestamp = self.inner.clock.stamp();
        let report = payload.into_report(uuid::Uuid::new_v4().to_string(), &timestamp);
        let id = report.id.clone();

        match backend.store.create_report(report).await {
            Ok(stored) => {
                log::debug!("Created report {id}");
                Some(renormalize(&stored))
            }
            Err(e) => {
                log::warn!("Failed to create report {id} in {} store: {e}", backend.kind);
                None
            }
        }
    }

    /// Lists reports matching `options`, newest first.
    ///
    /// Returns an empty list when nothing matches or the backend is
    /// unavailable.
    pub async fn list_reports(&self, options: &ListOptions) -> Vec<Report> {
        let Some(backend) = self.resolved("list reports").await else {
            return Vec::new();
        };
        absorb_read_failure(backend.store.list_reports(options).await, "list reports")
            .unwrap_or_default()
            .iter()
            .map(renormalize)
            .collect()
    }

    /// Fetches one report. Returns `None` for empty or unknown ids, and when
    /// the backend is unavailable.
    pub async fn get_report(&self, id: &str) -> Option<Report> {
        if id.trim().is_empty() {
            return None;
        }
        let backend = self.resolved("get report").await?;
        absorb_read_failure(backend.store.get_report(id).await, "get report")
            .flatten()
            .as_ref()
            .map(renormalize)
    }

    /// Applies an allow-listed patch and stamps a fresh `updatedAt`.
    ///
    /// Returns `None` without touching the backend when `id` is empty, and
    /// `None` when the report does not exist or the update failed.
    pub async fn update_report(&self, id: &str, patch: ReportPatch) -> Option<Report> {
        if id.trim().is_empty() {
            log::debug!("Ignoring update with empty report id");
            return None;
        }
        let backend = self.resolved("update report").await?;

        let patch = patch.stamped(self.inner.clock.stamp());
        match backend.store.update_report(id, &patch).await {
            Ok(updated) => updated.as_ref().map(renormalize),
            Err(e) => {
                log::warn!("Failed to update report {id} in {} store: {e}", backend.kind);
                None
            }
        }
    }
}

/// Read-availability policy: a failed read is logged and treated as "no
/// data" so that a broken backend degrades listings instead of failing them.
#[must_use]
pub fn absorb_read_failure<T>(result: Result<T, StoreError>, operation: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Failed to {operation}, returning no results: {e}");
            None
        }
    }
}

/// Passes an adapter result through the normalizer once more so every
/// returned report has the canonical shape regardless of backend.
fn renormalize(report: &Report) -> Report {
    normalize_report(&report.to_value()).unwrap_or_else(|| report.clone())
}

/// Issues strictly increasing timestamps.
///
/// Microsecond precision, RFC 3339, UTC (`2026-01-01T00:00:00.000000Z`), so
/// lexical order equals chronological order. A stamp that would not be
/// later than the previous one is bumped by one microsecond.
#[derive(Debug, Default)]
struct Timestamper {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Timestamper {
    fn stamp(&self) -> String {
        let mut now = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last
            && now <= previous
        {
            now = previous + TimeDelta::microseconds(1);
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::test_utils::{FailingStore, TempDir};
    use citizen_map_report_models::BoundingBox;
    use serde_json::json;

    fn heat_report() -> NewReport {
        NewReport::new()
            .category("heat")
            .latitude("-12.05")
            .longitude(-77.03)
            .description("hot corner")
    }

    async fn heat_scenario(repository: &ReportRepository) {
        let created = repository.create_report(heat_report()).await.unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.latitude, Some(-12.05));
        assert_eq!(created.longitude, Some(-77.03));
        assert_eq!(created.status, "open");
        assert_eq!(created.source, "citizen");
        assert_eq!(created.created_at, created.updated_at);

        let inside = ListOptions {
            bbox: Some(BoundingBox::new(-77.1, -12.1, -77.0, -12.0)),
            ..ListOptions::default()
        };
        let listed = repository.list_reports(&inside).await;
        assert!(listed.iter().any(|r| r.id == created.id));

        let elsewhere = ListOptions {
            bbox: Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            ..ListOptions::default()
        };
        assert!(repository.list_reports(&elsewhere).await.is_empty());

        let updated = repository
            .update_report(&created.id, ReportPatch::new().status("validated"))
            .await
            .unwrap();
        assert_eq!(updated.status, "validated");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > updated.created_at);

        assert_eq!(repository.get_report(&created.id).await, Some(updated));
    }

    #[tokio::test]
    async fn heat_scenario_on_memory_backend() {
        heat_scenario(&ReportRepository::new(RepositoryConfig::memory())).await;
    }

    #[tokio::test]
    async fn heat_scenario_on_file_backend() {
        let tmp = TempDir::new("repository_heat_file");
        let repository = ReportRepository::new(RepositoryConfig::file(tmp.path().join("r.json")));
        heat_scenario(&repository).await;
        assert_eq!(repository.backend_kind().await, Some(BackendKind::File));
    }

    #[tokio::test]
    async fn concurrent_cold_start_builds_one_backend() {
        let repository = ReportRepository::new(RepositoryConfig::memory());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let repository = repository.clone();
            tasks.spawn(async move {
                let backend = repository.backend().await.unwrap();
                Arc::clone(&backend.store)
            });
        }

        let mut stores = Vec::new();
        while let Some(result) = tasks.join_next().await {
            stores.push(result.unwrap());
        }
        let first = &stores[0];
        assert!(stores.iter().all(|s| Arc::ptr_eq(s, first)));

        // Reports written through one clone are visible through another.
        let created = repository.create_report(heat_report()).await.unwrap();
        let other = repository.clone();
        assert!(other.get_report(&created.id).await.is_some());
    }

    #[tokio::test]
    async fn update_allow_list_protects_identity_fields() {
        let repository = ReportRepository::new(RepositoryConfig::memory());
        let created = repository.create_report(heat_report()).await.unwrap();

        let patch = ReportPatch::from_value(&json!({
            "id": "hijacked",
            "createdAt": "1970-01-01T00:00:00.000000Z",
            "updatedAt": "1970-01-01T00:00:00.000000Z",
            "source": "import",
        }));
        let updated = repository.update_report(&created.id, patch).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.source, "citizen");
        assert_ne!(updated.updated_at, created.updated_at);
        assert!(repository.get_report("hijacked").await.is_none());
    }

    #[tokio::test]
    async fn empty_ids_never_reach_the_backend() {
        let store = Arc::new(FailingStore::default());
        let repository = ReportRepository::with_store(store.clone());

        assert!(repository.update_report("", ReportPatch::new().status("x")).await.is_none());
        assert!(repository.update_report("  ", ReportPatch::new()).await.is_none());
        assert!(repository.get_report("").await.is_none());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backend_failures_become_empty_results() {
        let store = Arc::new(FailingStore::default());
        let repository = ReportRepository::with_store(store.clone());

        assert!(repository.create_report(heat_report()).await.is_none());
        assert!(repository.list_reports(&ListOptions::default()).await.is_empty());
        assert!(repository.get_report("a").await.is_none());
        assert!(
            repository
                .update_report("a", ReportPatch::new().status("validated"))
                .await
                .is_none()
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn absorb_read_failure_policy() {
        assert_eq!(absorb_read_failure::<u8>(Ok(3), "read"), Some(3));
        let failed: Result<u8, StoreError> = Err(StoreError::Backend {
            message: "offline".to_string(),
        });
        assert_eq!(absorb_read_failure(failed, "read"), None);
    }

    #[test]
    fn timestamps_strictly_increase() {
        let clock = Timestamper::default();
        let stamps: Vec<String> = (0..1000).map(|_| clock.stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert!(stamps[0].ends_with('Z'));
        assert_eq!(stamps[0].len(), "2026-01-01T00:00:00.000000Z".len());
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let repository = ReportRepository::new(RepositoryConfig::memory());
        for _ in 0..3 {
            repository.create_report(heat_report()).await.unwrap();
        }

        let zero = ListOptions {
            limit: Some(0.0),
            ..ListOptions::default()
        };
        assert_eq!(repository.list_reports(&zero).await.len(), 1);

        let huge = ListOptions {
            limit: Some(10_000.0),
            ..ListOptions::default()
        };
        assert_eq!(repository.list_reports(&huge).await.len(), 3);
    }

    #[tokio::test]
    async fn backends_agree_on_the_same_operations() {
        use crate::document::DocumentReportStore;
        use crate::file::FileReportStore;
        use crate::memory::MemoryReportStore;
        use crate::test_utils::{InMemoryCollection, fixed_report};

        let tmp = TempDir::new("repository_equivalence");
        let stores: Vec<Arc<dyn ReportStore>> = vec![
            Arc::new(MemoryReportStore::new()),
            Arc::new(FileReportStore::new(tmp.path().join("reports.json"))),
            Arc::new(DocumentReportStore::new(Box::new(InMemoryCollection::new(
                "reports",
            )))),
        ];

        let mut reports = vec![
            fixed_report("a", "2026-01-01T00:00:00.000000Z"),
            fixed_report("b", "2026-01-02T00:00:00.000000Z"),
            fixed_report("c", "2026-01-02T00:00:00.000000Z"),
            fixed_report("d", "2026-01-03T00:00:00.000000Z"),
        ];
        reports[0].latitude = Some(-12.05);
        reports[0].longitude = Some(-77.03);
        reports[2].category = "water".to_string();

        let patches = [
            ("b", ReportPatch::new().status("validated")),
            ("d", ReportPatch::new().latitude(-12.01).longitude(-77.05)),
            ("missing", ReportPatch::new().status("resolved")),
            ("b", ReportPatch::from_value(&json!({ "status": "" }))),
            ("c", ReportPatch::from_value(&json!({ "category": 7, "status": null }))),
            ("a", ReportPatch::from_value(&json!({ "latitude": "bogus" }))),
            ("a", ReportPatch::from_value(&json!({ "latitude": 1.5 }))),
            ("d", ReportPatch::from_value(&json!({ "description": 42, "longitude": "" }))),
        ];
        let open = ListOptions {
            status: Some("open".to_string()),
            ..ListOptions::default()
        };
        let other = ListOptions {
            category: Some("other".to_string()),
            ..ListOptions::default()
        };
        let queries = [
            ListOptions::default(),
            ListOptions {
                limit: Some(2.0),
                ..ListOptions::default()
            },
            ListOptions {
                status: Some("open".to_string()),
                ..ListOptions::default()
            },
            ListOptions {
                category: Some("heat".to_string()),
                bbox: Some(BoundingBox::new(-77.1, -12.1, -77.0, -12.0)),
                ..ListOptions::default()
            },
        ];

        let mut transcripts = Vec::new();
        for store in &stores {
            let repository = ReportRepository::with_store(Arc::clone(store));
            let mut transcript = Vec::new();
            for report in &reports {
                store.create_report(report.clone()).await.unwrap();
            }
            for (id, patch) in &patches {
                let patch = patch.clone().stamped("2026-02-01T00:00:00.000000Z");
                let updated = store.update_report(id, &patch).await.unwrap();
                transcript.push(serde_json::to_string(&updated).unwrap());
                for filtered in [&open, &other] {
                    let listed = repository.list_reports(filtered).await;
                    transcript.push(serde_json::to_string(&listed).unwrap());
                }
            }
            for query in &queries {
                let listed = repository.list_reports(query).await;
                transcript.push(serde_json::to_string(&listed).unwrap());
            }
            transcript.push(serde_json::to_string(&repository.get_report("c").await).unwrap());
            transcripts.push(transcript);
        }

        assert_eq!(transcripts[0], transcripts[1]);
        assert_eq!(transcripts[0], transcripts[2]);
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let repository = ReportRepository::new(RepositoryConfig::memory());
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(repository.create_report(heat_report()).await.unwrap());
        }

        let listed = repository.list_reports(&ListOptions::default()).await;
        let expected: Vec<&str> = created.iter().rev().map(|r| r.id.as_str()).collect();
        let actual: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(actual, expected);
        assert!(listed.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }
}
