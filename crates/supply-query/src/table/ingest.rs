//! Pending-log ingestion: header-less rows dropped into the pending file are
//! hashed and appended to the supply log, then the pending file is cleared.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::types::SupplyRecord;

/// Column order of the pending file.
pub const PENDING_COLUMNS: [&str; 7] = [
    "supply_name",
    "supplier_name",
    "quantity_supplied",
    "hospital_name",
    "weekly_wastage",
    "severity",
    "people_per_week",
];

/// Header written when the supply log is created from scratch.
const LOG_COLUMNS: [&str; 8] = [
    "hospital_name",
    "supply_name",
    "supplier_name",
    "quantity_supplied",
    "weekly_wastage",
    "severity",
    "people_per_week",
    "hashcode",
];

#[derive(Debug, Deserialize)]
struct PendingRow {
    supply_name: String,
    supplier_name: String,
    quantity_supplied: u64,
    hospital_name: String,
    weekly_wastage: u64,
    severity: String,
    people_per_week: u64,
}

impl From<PendingRow> for SupplyRecord {
    fn from(row: PendingRow) -> Self {
        let mut record = SupplyRecord {
            hospital_name: row.hospital_name,
            supply_name: row.supply_name,
            supplier_name: row.supplier_name,
            quantity_supplied: row.quantity_supplied,
            weekly_wastage: row.weekly_wastage,
            severity: row.severity,
            people_per_week: row.people_per_week,
            hashcode: String::new(),
        };
        record.ensure_hashcode();
        record
    }
}

/// Append pending rows to the supply log and clear the pending file.
///
/// Returns the appended records (empty when there was nothing to ingest).
/// A malformed pending file is an error and leaves both files untouched.
pub fn append_pending_logs(csv_file: &Path, pending_file: &Path) -> Result<Vec<SupplyRecord>> {
    let has_pending = std::fs::metadata(pending_file)
        .map(|m| m.len() > 0)
        .unwrap_or(false);
    if !has_pending {
        tracing::info!(pending = %pending_file.display(), "No new logs to process");
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(pending_file)
        .with_context(|| format!("Failed to read {}", pending_file.display()))?;
    let records = parse_pending(&raw)
        .with_context(|| format!("Malformed pending logs in {}", pending_file.display()))?;

    if records.is_empty() {
        truncate(pending_file)?;
        return Ok(records);
    }

    append_records(csv_file, &records)?;
    truncate(pending_file)?;

    tracing::info!(
        appended = records.len(),
        log = %csv_file.display(),
        "Appended pending logs to supply log"
    );
    Ok(records)
}

fn parse_pending(raw: &str) -> Result<Vec<SupplyRecord>> {
    let body = raw
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    reader
        .deserialize::<PendingRow>()
        .map(|row| row.map(SupplyRecord::from).map_err(anyhow::Error::from))
        .collect()
}

/// Append rows in the column order of the existing header.
fn append_records(csv_file: &Path, records: &[SupplyRecord]) -> Result<()> {
    let existing_len = std::fs::metadata(csv_file).map(|m| m.len()).unwrap_or(0);

    let header: Vec<String> = if existing_len > 0 {
        existing_header(csv_file)?
    } else {
        LOG_COLUMNS.iter().map(|c| c.to_string()).collect()
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(csv_file)
        .with_context(|| format!("Failed to open {}", csv_file.display()))?;

    if existing_len > 0 && !ends_with_newline(&mut file)? {
        file.write_all(b"\n")?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if existing_len == 0 {
        writer.write_record(&header)?;
    }
    for record in records {
        writer.write_record(header.iter().map(|column| column_value(record, column)))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", csv_file.display()))?;
    Ok(())
}

fn existing_header(csv_file: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_file)
        .with_context(|| format!("Failed to open {}", csv_file.display()))?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

fn ends_with_newline(file: &mut std::fs::File) -> Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Columns the log does not know about are left empty.
fn column_value(record: &SupplyRecord, column: &str) -> String {
    match column {
        "hospital_name" => record.hospital_name.clone(),
        "supply_name" => record.supply_name.clone(),
        "supplier_name" => record.supplier_name.clone(),
        "quantity_supplied" => record.quantity_supplied.to_string(),
        "weekly_wastage" => record.weekly_wastage.to_string(),
        "severity" => record.severity.clone(),
        "people_per_week" => record.people_per_week.to_string(),
        "hashcode" => record.hashcode.clone(),
        _ => String::new(),
    }
}

fn truncate(path: &Path) -> Result<()> {
    std::fs::File::create(path)
        .with_context(|| format!("Failed to clear {}", path.display()))?;
    Ok(())
}
