//! Local JSON storage.
//!
//! Every output is rewritten whole: serialized into a temporary file next to
//! the target and renamed over it, so readers never observe a torn file.

pub mod rolling;

pub use rolling::ModeChangeStore;

use crate::models::{catalog_from_records, Catalog, ParkRecord};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Like [`read_json`], but a missing file is `Ok(None)`.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!("{} does not exist", path.display());
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Pretty-print `value` to `path`, replacing any previous content atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// Write one line per item, replacing any previous content atomically.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    write_atomic(path, |writer| {
        for line in lines {
            writeln!(writer, "{}", line.as_ref())?;
        }
        Ok(())
    })
}

fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(&mut temp);
        fill(&mut writer).with_context(|| format!("Failed to write {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    temp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// On-disk catalog layouts: a bare array or an object wrapping `parks`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    List(Vec<ParkRecord>),
    Wrapped { parks: Vec<ParkRecord> },
}

/// Load a catalog snapshot. A missing file is an empty catalog.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let records = match read_json_opt::<SnapshotFile>(path)? {
        Some(SnapshotFile::List(parks)) | Some(SnapshotFile::Wrapped { parks }) => parks,
        None => Vec::new(),
    };
    Ok(catalog_from_records(records))
}

/// Write a catalog as a JSON array ordered by reference.
pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    let parks: Vec<&ParkRecord> = catalog.values().collect();
    write_json(path, &parks)
}
