use super::atomic::{read_or_default, write_atomic};
use crate::core::currency::PairKey;
use crate::core::error::Result;
use crate::core::rates::{RateEntry, RatesCache, format_timestamp};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The persisted rate cache. Every operation reads the file fresh.
#[derive(Debug, Clone)]
pub struct RateCache {
    path: PathBuf,
}

impl RateCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> RatesCache {
        read_or_default(&self.path)
    }

    /// Merges `incoming` into the stored cache with a newest-wins rule and
    /// persists the result. Returns the number of pairs written.
    pub fn merge_write(
        &self,
        incoming: BTreeMap<PairKey, RateEntry>,
        refresh_timestamp: DateTime<Utc>,
    ) -> Result<usize> {
        let mut cache = self.read();
        let mut updated = 0;

        for (pair, entry) in incoming {
            if should_replace(cache.pairs.get(&pair), &entry) {
                cache.pairs.insert(pair, entry);
                updated += 1;
            } else {
                debug!(pair = %pair, "Keeping cached rate, incoming entry is older or invalid");
            }
        }

        cache.last_refresh = Some(format_timestamp(refresh_timestamp));
        write_atomic(&self.path, &cache)?;
        Ok(updated)
    }
}

fn should_replace(current: Option<&RateEntry>, incoming: &RateEntry) -> bool {
    if !incoming.has_valid_rate() {
        return false;
    }
    let Some(current) = current else {
        return true;
    };
    let Some(current_ts) = current.updated_at() else {
        // Existing state is malformed, let the incoming value repair it.
        return true;
    };
    match incoming.updated_at() {
        Some(incoming_ts) => incoming_ts >= current_ts,
        None => false,
    }
}
