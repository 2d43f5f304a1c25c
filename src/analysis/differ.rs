//! Catalog snapshot reconciliation.
//!
//! Compares the persisted catalog with a freshly fetched one. Metadata
//! differences become [`ChangeRecord`]s; contact-count differences are
//! reported separately because only they trigger a mode-total refresh.

use crate::models::{Catalog, ChangeRecord, ParkRecord};
use chrono::{DateTime, SecondsFormat, Utc};

pub const PARK_ADDED: &str = "Park added";
pub const PARK_DELETED: &str = "Park deleted";

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDiff {
    /// Added, then deleted, then modified parks; each group by reference.
    pub changes: Vec<ChangeRecord>,
    /// References present in both catalogs whose `qsos` differs, sorted.
    pub activity_changed: Vec<String>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.activity_changed.is_empty()
    }

    /// Count of records carrying the given change tag.
    pub fn count_tagged(&self, tag: &str) -> usize {
        self.changes.iter().filter(|c| c.change == tag).count()
    }
}

/// Diff two catalogs. Every record produced shares `captured_at`.
pub fn diff_catalogs(old: &Catalog, new: &Catalog, captured_at: DateTime<Utc>) -> CatalogDiff {
    let timestamp = captured_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let record = |park: &ParkRecord, change: String| ChangeRecord {
        park: park.clone(),
        change,
        timestamp: timestamp.clone(),
    };

    let mut diff = CatalogDiff::default();

    for (reference, park) in new {
        if !old.contains_key(reference) {
            diff.changes.push(record(park, PARK_ADDED.to_string()));
        }
    }

    for (reference, park) in old {
        if !new.contains_key(reference) {
            diff.changes.push(record(park, PARK_DELETED.to_string()));
        }
    }

    for (reference, before) in old {
        let Some(after) = new.get(reference) else {
            continue;
        };

        let tags = metadata_changes(before, after);
        if !tags.is_empty() {
            diff.changes.push(record(after, tags.join(", ")));
        }

        if before.qsos != after.qsos {
            diff.activity_changed.push(reference.clone());
        }
    }

    diff
}

/// Human-readable tags for every metadata field that differs.
pub fn metadata_changes(before: &ParkRecord, after: &ParkRecord) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if before.name != after.name {
        tags.push("name changed");
    }
    if before.latitude != after.latitude || before.longitude != after.longitude {
        tags.push("location changed");
    }
    if before.location_desc != after.location_desc {
        tags.push("location description changed");
    }
    if before.grid != after.grid {
        tags.push("grid changed");
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog_from_records;
    use chrono::TimeZone;

    fn park(reference: &str, name: &str, qsos: Option<i64>) -> ParkRecord {
        let mut park = ParkRecord::new(reference);
        park.name = Some(name.to_string());
        park.qsos = qsos;
        park
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_added_and_deleted() {
        let old = catalog_from_records(vec![park("A", "X", None)]);
        let new = catalog_from_records(vec![park("B", "Y", None)]);

        let diff = diff_catalogs(&old, &new, at());

        assert_eq!(diff.changes.len(), 2);
        assert_eq!(diff.changes[0].park.reference, "B");
        assert_eq!(diff.changes[0].change, PARK_ADDED);
        assert_eq!(diff.changes[1].park.reference, "A");
        assert_eq!(diff.changes[1].change, PARK_DELETED);
        assert_eq!(diff.changes[1].park.name.as_deref(), Some("X"));
        assert!(diff.activity_changed.is_empty());
    }

    #[test]
    fn test_activity_change_is_tracked_separately() {
        let old = catalog_from_records(vec![park("A", "X", Some(5))]);
        let new = catalog_from_records(vec![park("A", "X", Some(9))]);

        let diff = diff_catalogs(&old, &new, at());

        assert!(diff.changes.is_empty());
        assert_eq!(diff.activity_changed, vec!["A".to_string()]);
    }

    #[test]
    fn test_field_tags_joined() {
        let mut before = park("US-0001", "Acadia", Some(1));
        before.latitude = Some(44.0);
        before.longitude = Some(-68.0);
        before.grid = Some("FN54".to_string());
        before.location_desc = Some("US-ME".to_string());

        let mut after = before.clone();
        after.name = Some("Acadia NP".to_string());
        after.longitude = Some(-68.5);
        after.grid = Some("FN54vh".to_string());
        after.qsos = Some(2);

        let old = catalog_from_records(vec![before]);
        let new = catalog_from_records(vec![after]);
        let diff = diff_catalogs(&old, &new, at());

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(
            diff.changes[0].change,
            "name changed, location changed, grid changed"
        );
        assert_eq!(diff.changes[0].park.name.as_deref(), Some("Acadia NP"));
        assert_eq!(diff.activity_changed, vec!["US-0001".to_string()]);
    }

    #[test]
    fn test_location_description_tag() {
        let before = park("CA-0001", "Banff", None);
        let mut after = before.clone();
        after.location_desc = Some("CA-AB".to_string());

        let tags = metadata_changes(&before, &after);
        assert_eq!(tags, vec!["location description changed"]);
    }

    #[test]
    fn test_unchanged_catalog_is_empty() {
        let catalog = catalog_from_records(vec![park("A", "X", Some(1)), park("B", "Y", Some(2))]);
        let diff = diff_catalogs(&catalog, &catalog, at());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_shared_timestamp_and_ordering() {
        let old = catalog_from_records(vec![park("C", "c", None), park("D", "d", None)]);
        let new = catalog_from_records(vec![
            park("B", "b", None),
            park("A", "a", None),
            park("D", "d2", None),
        ]);

        let diff = diff_catalogs(&old, &new, at());
        let refs: Vec<_> = diff
            .changes
            .iter()
            .map(|c| (c.park.reference.as_str(), c.change.as_str()))
            .collect();

        assert_eq!(
            refs,
            vec![
                ("A", PARK_ADDED),
                ("B", PARK_ADDED),
                ("C", PARK_DELETED),
                ("D", "name changed"),
            ]
        );
        assert!(diff.changes.iter().all(|c| c.timestamp == "2024-06-01T03:00:00Z"));
        assert_eq!(diff.count_tagged(PARK_ADDED), 2);
    }

    #[test]
    fn test_cold_start_marks_everything_added() {
        let new = catalog_from_records(vec![park("A", "X", Some(3))]);
        let diff = diff_catalogs(&Catalog::new(), &new, at());
        assert_eq!(diff.count_tagged(PARK_ADDED), 1);
        assert!(diff.activity_changed.is_empty());
    }
}
