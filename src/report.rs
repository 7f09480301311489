//! Report table and rank-gated reporter
//!
//! The sweep controller appends one [`ReportRow`] per measured
//! configuration to a caller-owned [`ReportTable`]. When the sweep
//! completes with reporting enabled, [`Reporter::finish`] prints the table
//! and writes it as CSV, on the reporting rank only.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::SweepConfig;
use crate::distributed::RankGate;
use crate::error::{io_context, BenchResult};

/// CSV header, in column order
pub const REPORT_COLUMNS: [&str; 6] = ["model", "tp", "batch", "input", "output", "latency"];

/// Mean latency of one configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub model: String,
    /// Tensor-parallel width
    pub tp: usize,
    pub batch: usize,
    pub input: usize,
    pub output: usize,
    /// Mean latency in seconds
    pub latency: f64,
}

/// Rows accumulated over a sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the header and every row as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> BenchResult<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        // Explicit header so an empty table still names its columns
        csv.write_record(REPORT_COLUMNS)?;
        for row in &self.rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the table to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> BenchResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| io_context(e, &format!("creating {}", parent.display())))?;
        }
        let file = File::create(path)
            .map_err(|e| io_context(e, &format!("creating {}", path.display())))?;
        self.write_csv(file)
    }
}

impl fmt::Display for ReportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "Empty report: no configurations were measured");
        }

        let cells: Vec<[String; 6]> = self
            .rows
            .iter()
            .map(|r| {
                [
                    r.model.clone(),
                    r.tp.to_string(),
                    r.batch.to_string(),
                    r.input.to_string(),
                    r.output.to_string(),
                    format!("{:.6}", r.latency),
                ]
            })
            .collect();

        let mut widths = REPORT_COLUMNS.map(str::len);
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.len());
            }
        }
        let index_width = (self.rows.len() - 1).to_string().len();

        write!(f, "{:iw$}", "", iw = index_width)?;
        for (name, width) in REPORT_COLUMNS.iter().zip(widths.iter()) {
            write!(f, "  {:>w$}", name, w = width)?;
        }
        for (i, row) in cells.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{:<iw$}", i, iw = index_width)?;
            for (cell, width) in row.iter().zip(widths.iter()) {
                write!(f, "  {:>w$}", cell, w = width)?;
            }
        }
        Ok(())
    }
}

/// Prints and persists the table on the reporting rank
pub struct Reporter<'a> {
    rank: &'a dyn RankGate,
    enabled: bool,
    path: PathBuf,
}

impl<'a> Reporter<'a> {
    pub fn new(rank: &'a dyn RankGate, enabled: bool, path: impl Into<PathBuf>) -> Self {
        Reporter {
            rank,
            enabled,
            path: path.into(),
        }
    }

    pub fn from_config(config: &SweepConfig, rank: &'a dyn RankGate) -> Self {
        Self::new(rank, config.report, config.report_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Report a completed sweep.
    ///
    /// Returns the written path, or `None` when this rank does not report
    /// or reporting is disabled.
    pub fn finish(&self, table: &ReportTable) -> BenchResult<Option<PathBuf>> {
        if !self.rank.is_reporting_rank() {
            debug!(rank = self.rank.rank(), "not the reporting rank, skipping report");
            return Ok(None);
        }
        if !self.enabled {
            return Ok(None);
        }

        println!("{}", table);
        table.save(&self.path)?;
        info!(path = %self.path.display(), rows = table.len(), "report written");
        Ok(Some(self.path.clone()))
    }
}
