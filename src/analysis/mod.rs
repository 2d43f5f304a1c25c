//! Analysis modules.
//!
//! Pure functions over fetched data: activation payload aggregation and
//! catalog snapshot reconciliation. Nothing in here performs I/O.

pub mod aggregator;
pub mod differ;

pub use aggregator::aggregate_modes;
pub use differ::{diff_catalogs, CatalogDiff, PARK_ADDED, PARK_DELETED};
