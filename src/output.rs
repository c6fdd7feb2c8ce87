//! Output formatting and persistence for pipeline results.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::optimizer::ScheduleSolution;
use crate::pipeline::types::StopPairStat;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs stop-pair statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &[StopPairStat]) {
    for stat in stats {
        debug!("{:#?}", stat);
    }
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes a schedule solution as pretty JSON, replacing any existing file.
pub fn write_solution(path: &str, solution: &ScheduleSolution) -> Result<()> {
    std::fs::write(path, serde_json::to_vec_pretty(solution)?)?;
    info!(path, status = ?solution.status, "Schedule solution written");
    Ok(())
}
