//! Single-pair rate resolution: cache first, then an opportunistic fetch that writes through.

use crate::core::clock::Clock;
use crate::core::currency::PairKey;
use crate::core::error::{RateError, Result};
use crate::core::rates::RateEntry;
use crate::core::source::{SourceClient, SourceFetch};
use crate::store::RateCache;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// A freshly fetched rate for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairQuote {
    pub rate: f64,
    pub fetched_at: DateTime<Utc>,
    pub source: String,
}

/// Strategy used by the resolver on a cache miss.
#[async_trait]
pub trait PairFetcher: Send + Sync {
    async fn fetch_pair(&self, pair: &PairKey) -> Result<PairQuote>;
}

/// Fetches a single pair through the configured sources.
///
/// Tries a source quoting `FROM` in `TO`, then one quoting `TO` in `FROM`
/// (inverted), then bridges through a quote currency two sources share.
pub struct SourcePairFetcher {
    sources: Vec<Arc<dyn SourceClient>>,
}

impl SourcePairFetcher {
    pub fn new(sources: Vec<Arc<dyn SourceClient>>) -> Self {
        Self { sources }
    }

    fn find_source(&self, code: &str, quote: &str) -> Option<&Arc<dyn SourceClient>> {
        self.sources
            .iter()
            .find(|s| s.quote_currency() == quote && s.covers(code))
    }
}

fn leg_rate(fetch: &SourceFetch, source: &dyn SourceClient, code: &str, quote: &str) -> Result<f64> {
    let key = PairKey::new(code, quote)?;
    fetch.rates.get(&key).copied().ok_or_else(|| {
        RateError::source_fetch(source.name(), format!("No rate for {key} in response"))
    })
}

#[async_trait]
impl PairFetcher for SourcePairFetcher {
    async fn fetch_pair(&self, pair: &PairKey) -> Result<PairQuote> {
        let (from, to) = (pair.from_code(), pair.to_code());

        if let Some(source) = self.find_source(from, to) {
            debug!(pair = %pair, source = source.name(), "Fetching direct rate");
            let fetch = source.fetch_rates().await?;
            return Ok(PairQuote {
                rate: leg_rate(&fetch, source.as_ref(), from, to)?,
                fetched_at: fetch.fetched_at,
                source: source.name().to_string(),
            });
        }

        if let Some(source) = self.find_source(to, from) {
            debug!(pair = %pair, source = source.name(), "Fetching inverse rate");
            let fetch = source.fetch_rates().await?;
            return Ok(PairQuote {
                rate: 1.0 / leg_rate(&fetch, source.as_ref(), to, from)?,
                fetched_at: fetch.fetched_at,
                source: source.name().to_string(),
            });
        }

        for first in self.sources.iter().filter(|s| s.covers(from)) {
            let quote = first.quote_currency();
            let Some(second) = self.find_source(to, quote) else {
                continue;
            };
            debug!(pair = %pair, via = quote, "Fetching bridged rate");

            let first_fetch = first.fetch_rates().await?;
            let (second_fetch, source) = if first.id() == second.id() {
                (first_fetch.clone(), first.name().to_string())
            } else {
                (
                    second.fetch_rates().await?,
                    format!("{}+{}", first.name(), second.name()),
                )
            };

            let from_rate = leg_rate(&first_fetch, first.as_ref(), from, quote)?;
            let to_rate = leg_rate(&second_fetch, second.as_ref(), to, quote)?;
            return Ok(PairQuote {
                rate: from_rate / to_rate,
                fetched_at: first_fetch.fetched_at.min(second_fetch.fetched_at),
                source,
            });
        }

        Err(RateError::Unavailable {
            pair: pair.clone(),
            reason: "no configured source quotes this pair".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOrigin {
    Identity,
    Cached,
    CachedInverse,
    Fetched,
}

impl Display for RateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RateOrigin::Identity => "identity",
                RateOrigin::Cached => "cache",
                RateOrigin::CachedInverse => "cache (inverse)",
                RateOrigin::Fetched => "fetched",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub pair: PairKey,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
    pub origin: RateOrigin,
}

impl ResolvedRate {
    pub fn inverse_rate(&self) -> f64 {
        if self.rate == 0.0 { 0.0 } else { 1.0 / self.rate }
    }
}

pub struct RateResolver {
    cache: RateCache,
    fetcher: Arc<dyn PairFetcher>,
    clock: Arc<dyn Clock>,
}

impl RateResolver {
    pub fn new(cache: RateCache, fetcher: Arc<dyn PairFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            fetcher,
            clock,
        }
    }

    /// Resolves `from -> to`, serving a cached rate no older than `ttl_seconds`
    /// (directly or inverted) and fetching otherwise.
    ///
    /// A failed fetch is reported as [`RateError::Unavailable`]; stale cached
    /// values are never returned.
    pub async fn resolve(&self, from: &str, to: &str, ttl_seconds: u64) -> Result<ResolvedRate> {
        let pair = PairKey::new(from, to)?;
        let now = self.clock.now();

        if pair.is_identity() {
            return Ok(ResolvedRate {
                pair,
                rate: 1.0,
                updated_at: now,
                source: "identity".to_string(),
                origin: RateOrigin::Identity,
            });
        }

        let cache = self.cache.read();
        if let Some((entry, updated_at)) = cache
            .get(&pair)
            .filter(|e| e.is_fresh(now, ttl_seconds))
            .and_then(|e| e.updated_at().map(|ts| (e, ts)))
        {
            debug!(pair = %pair, "Cache HIT");
            return Ok(ResolvedRate {
                pair,
                rate: entry.rate,
                updated_at,
                source: entry.source.clone(),
                origin: RateOrigin::Cached,
            });
        }

        let reverse = pair.reversed();
        if let Some((entry, updated_at)) = cache
            .get(&reverse)
            .filter(|e| e.rate > 0.0 && e.is_fresh(now, ttl_seconds))
            .and_then(|e| e.updated_at().map(|ts| (e, ts)))
        {
            debug!(pair = %pair, reverse = %reverse, "Cache HIT on reverse pair");
            return Ok(ResolvedRate {
                pair,
                rate: 1.0 / entry.rate,
                updated_at,
                source: entry.source.clone(),
                origin: RateOrigin::CachedInverse,
            });
        }

        debug!(pair = %pair, "Cache MISS, fetching");
        let quote = self
            .fetcher
            .fetch_pair(&pair)
            .await
            .map_err(|e| match e {
                RateError::Unavailable { .. } => e,
                other => RateError::Unavailable {
                    pair: pair.clone(),
                    reason: other.to_string(),
                },
            })?;
        if !(quote.rate.is_finite() && quote.rate > 0.0) {
            return Err(RateError::Unavailable {
                pair,
                reason: format!("{} returned an invalid rate {}", quote.source, quote.rate),
            });
        }

        let entry = RateEntry::new(quote.rate, quote.fetched_at, &quote.source);
        let updated = self
            .cache
            .merge_write(BTreeMap::from([(pair.clone(), entry)]), quote.fetched_at)?;
        if updated == 0 {
            debug!(pair = %pair, "Cached entry is newer than the fetched rate, kept it");
        }

        Ok(ResolvedRate {
            pair,
            rate: quote.rate,
            updated_at: quote.fetched_at,
            source: quote.source,
            origin: RateOrigin::Fetched,
        })
    }
}
