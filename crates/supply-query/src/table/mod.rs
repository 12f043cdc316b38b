//! Supply log storage: the read-only table a query runs against, the CSV
//! source it is loaded from, and pending-log ingestion.

pub mod ingest;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::SupplyRecord;

pub use ingest::{append_pending_logs, PENDING_COLUMNS};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Supply log not found: {0}")]
    Missing(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed supply log {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type TableResult<T> = Result<T, TableError>;

/// Ordered supply log. Row order is append order; the last row is the most recent.
#[derive(Debug, Clone, Default)]
pub struct SupplyTable {
    records: Vec<SupplyRecord>,
}

impl SupplyTable {
    pub fn new(records: Vec<SupplyRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SupplyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct non-empty values of `key` in first-appearance order.
    pub fn distinct<F>(&self, key: F) -> Vec<String>
    where
        F: Fn(&SupplyRecord) -> String,
    {
        distinct_values(self.records.iter(), key)
    }
}

/// Distinct non-empty values over any row subset, first appearance first.
pub fn distinct_values<'a, I, F>(rows: I, key: F) -> Vec<String>
where
    I: IntoIterator<Item = &'a SupplyRecord>,
    F: Fn(&SupplyRecord) -> String,
{
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for row in rows {
        let value = key(row);
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.clone()) {
            values.push(value);
        }
    }
    values
}

/// Where the table comes from. Loaded fresh for every query.
pub trait TableSource: Send + Sync {
    fn load(&self) -> TableResult<SupplyTable>;
}

/// Reads the supply log from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvTableSource {
    path: PathBuf,
}

impl CsvTableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for CsvTableSource {
    fn load(&self) -> TableResult<SupplyTable> {
        read_csv(&self.path).map(SupplyTable::new)
    }
}

/// Read every row of a headed supply log, deriving hashcodes for rows without one.
pub fn read_csv(path: &Path) -> TableResult<Vec<SupplyRecord>> {
    if !path.exists() {
        return Err(TableError::Missing(path.to_path_buf()));
    }

    let file = std::fs::File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    for row in reader.deserialize::<SupplyRecord>() {
        let mut record = row.map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        record.ensure_hashcode();
        records.push(record);
    }

    tracing::debug!(path = %path.display(), rows = records.len(), "Loaded supply log");
    Ok(records)
}
