//! Data models for the park mirror.
//!
//! This module contains the records exchanged with the upstream API and
//! persisted on disk: catalog entries, change records and per-mode totals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One catalog entry.
///
/// Only the fields the mirror reasons about are typed; everything else the
/// upstream sends is kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkRecord {
    /// Stable unique key.
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
    /// Total contact count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qsos: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_totals: Option<ModeTotals>,
    /// Upstream fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParkRecord {
    /// Creates a record carrying only its reference.
    #[allow(dead_code)] // Records normally come from upstream JSON
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            name: None,
            latitude: None,
            longitude: None,
            location_desc: None,
            grid: None,
            qsos: None,
            mode_totals: None,
            extra: Map::new(),
        }
    }

    /// Store freshly computed mode totals and make `qsos` agree with them.
    pub fn apply_mode_totals(&mut self, totals: ModeTotals) {
        self.qsos = Some(totals.total() as i64);
        self.mode_totals = Some(totals);
    }
}

/// Catalog keyed by reference. Ordered so every output is deterministic.
pub type Catalog = BTreeMap<String, ParkRecord>;

/// Build a catalog from records; later records win on key collision.
pub fn catalog_from_records(records: impl IntoIterator<Item = ParkRecord>) -> Catalog {
    records
        .into_iter()
        .map(|park| (park.reference.clone(), park))
        .collect()
}

/// One detected difference for one reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// New record, or the old one for deletions.
    #[serde(flatten)]
    pub park: ParkRecord,
    /// Comma-joined change tags, or a fixed add/delete marker.
    pub change: String,
    /// UTC capture instant, RFC 3339.
    pub timestamp: String,
}

/// Per-mode contact totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeTotals {
    pub cw: u64,
    pub ssb: u64,
    pub data: u64,
}

impl ModeTotals {
    pub fn new(cw: u64, ssb: u64, data: u64) -> Self {
        Self { cw, ssb, data }
    }

    pub fn total(&self) -> u64 {
        self.cw + self.ssb + self.data
    }

    /// Add a count to one bucket.
    pub fn add(&mut self, bucket: ModeBucket, count: u64) {
        match bucket {
            ModeBucket::Cw => self.cw += count,
            ModeBucket::Ssb => self.ssb += count,
            ModeBucket::Data => self.data += count,
        }
    }
}

impl fmt::Display for ModeTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CW {} / SSB {} / DATA {}", self.cw, self.ssb, self.data)
    }
}

/// The three fixed categories every contact is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeBucket {
    Cw,
    Ssb,
    Data,
}

impl ModeBucket {
    /// Classify a free-form mode name.
    ///
    /// Anything that is not CW or phone counts as data, so new digital modes
    /// land in the right bucket without changes here.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode.map(|m| m.trim().to_lowercase()).as_deref() {
            Some("cw") => ModeBucket::Cw,
            Some("ssb") | Some("phone") | Some("ph") => ModeBucket::Ssb,
            _ => ModeBucket::Data,
        }
    }
}

/// One row of the mode-totals outputs: `{reference, cw, ssb, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRow {
    pub reference: String,
    #[serde(flatten)]
    pub totals: ModeTotals,
}

impl ModeRow {
    pub fn new(reference: impl Into<String>, totals: ModeTotals) -> Self {
        Self {
            reference: reference.into(),
            totals,
        }
    }
}
