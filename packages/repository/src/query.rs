//! Listing semantics shared by every backend.

use citizen_map_report_models::{ListOptions, Report};

/// Applies `options` to a set of reports in storage order.
///
/// Filters first (status, category, bbox; order among them is irrelevant),
/// then sorts newest first, then truncates to the clamped limit. The sort
/// is stable, so reports with equal `createdAt` keep their storage order.
#[must_use]
pub fn select_reports(
    reports: impl IntoIterator<Item = Report>,
    options: &ListOptions,
) -> Vec<Report> {
    let mut selected: Vec<Report> = reports
        .into_iter()
        .filter(|report| options.matches(report))
        .collect();
    sort_newest_first(&mut selected);
    selected.truncate(options.effective_limit());
    selected
}

/// Sorts by `createdAt` descending. Stable.
pub fn sort_newest_first(reports: &mut [Report]) {
    reports.sort_by(|a, b| b.created_at_key().cmp(a.created_at_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use citizen_map_report_models::{BoundingBox, NewReport};

    fn report(id: &str, created_at: &str, status: &str, lat: f64, lng: f64) -> Report {
        let mut payload = NewReport::new().category("heat").latitude(lat).longitude(lng);
        payload.set("status", status);
        payload.into_report(id.to_string(), created_at)
    }

    fn ids(reports: &[Report]) -> Vec<&str> {
        reports.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn sorts_newest_first_with_stable_ties() {
        let reports = vec![
            report("a", "2026-01-01T00:00:00.000000Z", "open", 0.0, 0.0),
            report("b", "2026-01-03T00:00:00.000000Z", "open", 0.0, 0.0),
            report("c", "2026-01-02T00:00:00.000000Z", "open", 0.0, 0.0),
            report("d", "2026-01-02T00:00:00.000000Z", "open", 0.0, 0.0),
        ];
        let selected = select_reports(reports, &ListOptions::default());
        assert_eq!(ids(&selected), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn limit_applies_after_filter_and_sort() {
        let reports = vec![
            report("old-open", "2026-01-01T00:00:00.000000Z", "open", 0.0, 0.0),
            report("new-closed", "2026-01-05T00:00:00.000000Z", "resolved", 0.0, 0.0),
            report("mid-open", "2026-01-03T00:00:00.000000Z", "open", 0.0, 0.0),
        ];
        let options = ListOptions {
            limit: Some(1.0),
            status: Some("open".to_string()),
            ..ListOptions::default()
        };
        assert_eq!(ids(&select_reports(reports, &options)), vec!["mid-open"]);
    }

    #[test]
    fn filters_are_commutative() {
        let reports = vec![
            report("in", "2026-01-01T00:00:00.000000Z", "open", 0.5, 0.5),
            report("out", "2026-01-02T00:00:00.000000Z", "open", 5.0, 5.0),
            report("closed", "2026-01-03T00:00:00.000000Z", "resolved", 0.5, 0.5),
        ];
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let combined = ListOptions {
            bbox: Some(bbox),
            status: Some("open".to_string()),
            ..ListOptions::default()
        };
        let status_then_bbox = select_reports(
            select_reports(
                reports.clone(),
                &ListOptions {
                    status: Some("open".to_string()),
                    ..ListOptions::default()
                },
            ),
            &ListOptions {
                bbox: Some(bbox),
                ..ListOptions::default()
            },
        );
        assert_eq!(select_reports(reports, &combined), status_then_bbox);
        assert_eq!(ids(&status_then_bbox), vec!["in"]);
    }

    #[test]
    fn limit_zero_still_returns_one() {
        let reports: Vec<Report> = (0..3)
            .map(|i| {
                let created_at = format!("2026-01-0{}T00:00:00.000000Z", i + 1);
                report(&i.to_string(), &created_at, "open", 0.0, 0.0)
            })
            .collect();
        let options = ListOptions {
            limit: Some(0.0),
            ..ListOptions::default()
        };
        assert_eq!(select_reports(reports, &options).len(), 1);
    }
}
