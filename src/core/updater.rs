//! Batch refresh across every configured source.

use crate::core::clock::Clock;
use crate::core::currency::PairKey;
use crate::core::error::{RateError, Result};
use crate::core::rates::{HistoryRecord, RateEntry, format_timestamp};
use crate::core::source::SourceClient;
use crate::store::{HistoryLog, RateCache};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of one update run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateSummary {
    /// Sources that returned rates, even if none were newer than the cache.
    pub sources_ok: usize,
    pub updated_count: usize,
    pub history_added: usize,
    pub last_refresh: String,
    pub errors: Vec<String>,
}

impl UpdateSummary {
    /// False when every selected source failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() || self.sources_ok > 0
    }
}

pub struct RatesUpdater {
    sources: Vec<Arc<dyn SourceClient>>,
    cache: RateCache,
    history: HistoryLog,
    clock: Arc<dyn Clock>,
}

impl RatesUpdater {
    pub fn new(
        sources: Vec<Arc<dyn SourceClient>>,
        cache: RateCache,
        history: HistoryLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            cache,
            history,
            clock,
        }
    }

    pub fn sources(&self) -> &[Arc<dyn SourceClient>] {
        &self.sources
    }

    fn select_sources(&self, filter: Option<&str>) -> Result<Vec<&Arc<dyn SourceClient>>> {
        let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
            return Ok(self.sources.iter().collect());
        };
        let selected: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.id().eq_ignore_ascii_case(filter) || s.name().eq_ignore_ascii_case(filter))
            .collect();
        if selected.is_empty() {
            return Err(RateError::UnknownSource {
                filter: filter.to_string(),
                available: self
                    .sources
                    .iter()
                    .map(|s| s.id().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(selected)
    }

    /// Fetches every selected source, merges the results into the cache and
    /// journals each observed rate.
    ///
    /// A failing source is recorded in `errors` and does not stop the run.
    /// When two sources return the same pair the later one in configuration
    /// order wins.
    #[instrument(name = "RatesUpdate", skip(self))]
    pub async fn run_update(&self, source_filter: Option<&str>) -> Result<UpdateSummary> {
        let selected = self.select_sources(source_filter)?;
        let now = self.clock.now();
        info!(sources = selected.len(), "Starting rates update");

        let results = join_all(selected.iter().map(|source| source.fetch_rates())).await;

        let mut combined: BTreeMap<PairKey, RateEntry> = BTreeMap::new();
        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut sources_ok = 0;

        for (source, result) in selected.iter().zip(results) {
            match result {
                Ok(fetch) => {
                    sources_ok += 1;
                    info!(
                        source = source.name(),
                        count = fetch.rates.len(),
                        "Fetched rates"
                    );
                    for (pair, rate) in &fetch.rates {
                        combined.insert(
                            pair.clone(),
                            RateEntry::new(*rate, fetch.fetched_at, source.name()),
                        );
                        records.push(HistoryRecord::new(
                            pair,
                            *rate,
                            fetch.fetched_at,
                            source.name(),
                            fetch.meta_json(pair),
                        ));
                    }
                }
                Err(e) => {
                    let detail = match e {
                        RateError::SourceFetch { message, .. } => message,
                        other => other.to_string(),
                    };
                    let message = format!("Failed to fetch from {}: {}", source.name(), detail);
                    warn!("{}", message);
                    errors.push(message);
                }
            }
        }

        let updated_count = self.cache.merge_write(combined, now)?;
        let history_added = self.history.append(&records)?;

        info!(
            updated = updated_count,
            history = history_added,
            errors = errors.len(),
            "Rates update finished"
        );
        Ok(UpdateSummary {
            sources_ok,
            updated_count,
            history_added,
            last_refresh: format_timestamp(now),
            errors,
        })
    }
}
