//! CSV output for exported device records.

use std::path::{Path, PathBuf};

use agni_common::{ExportSchema, Record};
use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

/// Derives the output filename from the segment name and the local
/// wall-clock time: `devices_<segment>_<YYYYmmdd_HHMM>.csv`.
pub fn output_filename(segment_name: &str, at: chrono::DateTime<Local>) -> String {
    format!(
        "devices_{}_{}.csv",
        segment_name.replace(' ', "_"),
        at.format("%Y%m%d_%H%M")
    )
}

/// Projects the records through the schema and writes one CSV file.
/// Returns the number of rows written.
pub fn write_csv(path: &Path, schema: &ExportSchema, records: &[Record]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;

    writer
        .write_record(schema.columns())
        .context("Failed to write CSV header")?;

    let rows = schema.project(records);
    for row in &rows {
        writer.write_record(row).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV file")?;

    info!("Exported {} rows to {:?}", rows.len(), path);
    Ok(rows.len())
}

/// Joins the configured output directory with the derived filename.
pub fn output_path(output_dir: &Path, segment_name: &str) -> PathBuf {
    output_dir.join(output_filename(segment_name, Local::now()))
}
