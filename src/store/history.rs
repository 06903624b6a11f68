use super::atomic::{read_or_default, write_atomic};
use crate::core::error::{RateError, Result};
use crate::core::rates::HistoryRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only journal of every observed rate, deduplicated by record id.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records in file order. Entries this version cannot interpret are skipped.
    pub fn read(&self) -> Vec<HistoryRecord> {
        let raw: Vec<Value> = read_or_default(&self.path);
        raw.into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }

    /// Appends the records whose id is not yet in the log and returns how many were added.
    ///
    /// Existing entries are written back untouched, even ones that do not
    /// match the current record shape.
    pub fn append(&self, records: &[HistoryRecord]) -> Result<usize> {
        let mut history: Vec<Value> = read_or_default(&self.path);
        let mut seen: HashSet<String> = history
            .iter()
            .filter_map(record_id)
            .map(str::to_string)
            .collect();

        let mut added = 0;
        for record in records {
            if record.id.is_empty() || !seen.insert(record.id.clone()) {
                debug!(id = %record.id, "Skipping duplicate history record");
                continue;
            }
            let value = serde_json::to_value(record).map_err(|source| RateError::Serialize {
                path: self.path.clone(),
                source,
            })?;
            history.push(value);
            added += 1;
        }

        write_atomic(&self.path, &history)?;
        Ok(added)
    }
}
