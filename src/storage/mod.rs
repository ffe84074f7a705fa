//! Flat-file persistence for stage outputs.

use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// A row type with a fixed header, so an empty table still gets one.
pub trait CsvTable: Serialize {
    /// Header names in serialisation order.
    const COLUMNS: &'static [&'static str];
}

/// Write `rows` under `T::COLUMNS`, creating parent directories as needed.
///
/// Rows are serialised into memory first so a failure leaves no file behind.
pub fn write_csv<T: CsvTable>(path: &Path, rows: &[T]) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;

    info!("Saved {} rows to {:?}", rows.len(), path);
    Ok(rows.len())
}
