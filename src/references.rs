//! Reference-list extraction.
//!
//! Work lists come from several producers: the catalog snapshot, the change
//! log, a rolling store, or a plain marker file with one reference per line.
//! This module accepts all of them and yields a clean, de-duplicated list.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Keys consulted, in order, to find a reference inside an object.
const REFERENCE_KEYS: [&str; 3] = ["reference", "ref", "id"];

/// Read a work list from `path`.
///
/// JSON documents are searched for references; anything that does not parse
/// as JSON is read as newline-delimited text.
pub fn load_references(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let raw = match serde_json::from_str::<Value>(&content) {
        Ok(value) => references_from_json(&value),
        Err(_) => {
            debug!("{} is not JSON, reading one reference per line", path.display());
            content.lines().map(str::to_string).collect()
        }
    };

    Ok(normalize(raw))
}

/// Pull references out of any supported JSON layout.
pub fn references_from_json(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(reference_of).collect(),
        Value::Object(obj) => {
            for key in ["parks", "changes"] {
                if let Some(Value::Array(items)) = obj.get(key) {
                    return items.iter().filter_map(reference_of).collect();
                }
            }
            if let Some(Value::Array(batches)) = obj.get("batches") {
                return batches
                    .iter()
                    .filter_map(|batch| batch.get("changes").and_then(Value::as_array))
                    .flatten()
                    .filter_map(reference_of)
                    .collect();
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn reference_of(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => REFERENCE_KEYS
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
            .map(str::to_string),
        _ => None,
    }
}

/// Trim, drop blanks and duplicates, keep first-seen order.
pub fn normalize(references: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    references
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_array_with_fallback_keys() {
        let value = json!([
            {"reference": "US-0001"},
            {"ref": "US-0002"},
            {"id": "US-0003"},
            {"reference": "", "ref": "US-0004"},
            {"name": "no reference"}
        ]);
        assert_eq!(
            references_from_json(&value),
            vec!["US-0001", "US-0002", "US-0003", "US-0004"]
        );
    }

    #[test]
    fn test_wrapped_layouts() {
        let parks = json!({"parks": [{"reference": "CA-0001"}]});
        let changes = json!({"changes": ["CA-0002", {"reference": "CA-0003"}]});
        let store = json!({"batches": [
            {"date": "2024-01-02", "changes": [{"reference": "GB-0001", "cw": 1}]},
            {"date": "2024-01-01", "changes": [{"reference": "GB-0002"}]},
            {"date": "2023-12-31"}
        ]});

        assert_eq!(references_from_json(&parks), vec!["CA-0001"]);
        assert_eq!(references_from_json(&changes), vec!["CA-0002", "CA-0003"]);
        assert_eq!(references_from_json(&store), vec!["GB-0001", "GB-0002"]);
        assert!(references_from_json(&json!({"other": 1})).is_empty());
    }

    #[test]
    fn test_normalize_dedupes_in_order() {
        let refs = vec![
            " B ".to_string(),
            "A".to_string(),
            "".to_string(),
            "B".to_string(),
        ];
        assert_eq!(normalize(refs), vec!["B", "A"]);
    }

    #[test]
    fn test_load_marker_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updateQSO.20240101T000000Z");
        std::fs::write(&path, "US-0001\nUS-0002\n\nUS-0001\n").unwrap();

        assert_eq!(load_references(&path).unwrap(), vec!["US-0001", "US-0002"]);
    }

    #[test]
    fn test_load_change_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("changes.json");
        std::fs::write(
            &path,
            r#"[{"reference": "NO-0001", "change": "Park added", "timestamp": "t"}, "NO-0002"]"#,
        )
        .unwrap();

        assert_eq!(load_references(&path).unwrap(), vec!["NO-0001", "NO-0002"]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_references(&dir.path().join("missing.json")).is_err());
    }
}
