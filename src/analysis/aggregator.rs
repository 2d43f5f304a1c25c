//! Activation payload aggregation.
//!
//! The activations endpoint has been seen returning three different shapes
//! for the same question. This module classifies a payload once and hands it
//! to one pure reducer per shape, so callers never probe fields themselves.
//! Nothing here fails: fields that are missing or not numeric count as zero.

use crate::models::{ModeBucket, ModeTotals};
use serde_json::{Map, Value};

/// Field names that mark a list entry as a daily aggregate.
const DAILY_FIELDS: [&str; 6] = ["qsosCW", "qsosDATA", "qsosPHONE", "cw", "data", "phone"];

/// Count fields of a free-form activation, in priority order.
const COUNT_FIELDS: [&str; 4] = ["qsos", "qsoCount", "qso", "count"];

/// Recognized payload shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadShape<'a> {
    /// Object carrying a ready-made `modeTotals` object.
    Aggregated(&'a Map<String, Value>),
    /// List of entries exposing `qsosCW` / `qsosDATA` / `qsosPHONE`.
    DailyTotals(&'a [Value]),
    /// List of per-activation records with a mode and a count.
    Activations(&'a [Value]),
    /// Nothing countable.
    Empty,
}

impl<'a> PayloadShape<'a> {
    /// Decide which reducer a payload needs.
    pub fn classify(payload: &'a Value) -> Self {
        match payload {
            Value::Object(obj) => match obj.get("modeTotals") {
                Some(Value::Object(totals)) => PayloadShape::Aggregated(totals),
                _ => PayloadShape::Empty,
            },
            Value::Array(items) if items.is_empty() => PayloadShape::Empty,
            Value::Array(items) => {
                if is_daily_list(items) {
                    PayloadShape::DailyTotals(items)
                } else {
                    PayloadShape::Activations(items)
                }
            }
            _ => PayloadShape::Empty,
        }
    }
}

/// Reduce any supported payload to `{cw, ssb, data}`.
pub fn aggregate_modes(payload: &Value) -> ModeTotals {
    match PayloadShape::classify(payload) {
        PayloadShape::Aggregated(totals) => sum_aggregated(totals),
        PayloadShape::DailyTotals(items) => sum_daily(items),
        PayloadShape::Activations(items) => sum_activations(items),
        PayloadShape::Empty => ModeTotals::default(),
    }
}

/// Read an already aggregated `modeTotals` object.
pub fn sum_aggregated(totals: &Map<String, Value>) -> ModeTotals {
    let count = |key: &str| totals.get(key).map(coerce_count).unwrap_or(0);
    ModeTotals::new(count("cw"), count("ssb"), count("data"))
}

/// Sum daily aggregate entries field by field.
pub fn sum_daily(items: &[Value]) -> ModeTotals {
    let mut totals = ModeTotals::default();
    for entry in items.iter().filter_map(Value::as_object) {
        totals.cw += first_count(entry, &["qsosCW", "cw"]).unwrap_or(0);
        totals.data += first_count(entry, &["qsosDATA", "data"]).unwrap_or(0);
        totals.ssb += first_count(entry, &["qsosPHONE", "phone"]).unwrap_or(0);
    }
    totals
}

/// Bucket free-form activation records by mode and add up their counts.
pub fn sum_activations(items: &[Value]) -> ModeTotals {
    let mut totals = ModeTotals::default();
    for record in items.iter().filter_map(Value::as_object) {
        let mode = record
            .get("mode")
            .or_else(|| record.get("modeName"))
            .and_then(Value::as_str);
        totals.add(ModeBucket::from_mode(mode), activation_count(record));
    }
    totals
}

fn activation_count(record: &Map<String, Value>) -> u64 {
    if let Some(count) = first_count(record, &COUNT_FIELDS) {
        return count;
    }
    match record.get("contacts") {
        Some(Value::Array(contacts)) => contacts.len() as u64,
        _ => 0,
    }
}

/// A list is a daily-aggregate list when every object entry exposes at least
/// one aggregate field.
fn is_daily_list(items: &[Value]) -> bool {
    let mut objects = items.iter().filter_map(Value::as_object).peekable();
    if objects.peek().is_none() {
        return false;
    }
    objects.all(|entry| DAILY_FIELDS.iter().any(|field| entry.contains_key(*field)))
}

/// Coerce the first present, non-null field among `fields`.
fn first_count(entry: &Map<String, Value>, fields: &[&str]) -> Option<u64> {
    fields
        .iter()
        .filter_map(|field| entry.get(*field))
        .find(|value| !value.is_null())
        .map(coerce_count)
}

/// Best-effort non-negative integer. Digit strings parse, floats truncate,
/// everything else is zero.
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                v
            } else if let Some(v) = n.as_f64() {
                if v.is_finite() && v > 0.0 {
                    v.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map(|v| v.max(0) as u64).unwrap_or(0),
        _ => 0,
    }
}
