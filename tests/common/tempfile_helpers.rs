//! tempfile wrappers with consistent error context

use anyhow::Context;
use std::path::Path;

/// Create a temp directory with a helpful error message.
pub fn create_temp_dir() -> anyhow::Result<tempfile::TempDir> {
    tempfile::tempdir().context("Failed to create temporary directory for test")
}

/// Read a report back as (header, data rows)
pub fn read_csv_rows(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open report {}", path.display()))?;
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}
