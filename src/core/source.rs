//! Upstream rate source abstraction

use crate::core::currency::PairKey;
use crate::core::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Request details captured for each pair a source returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchMeta {
    pub raw_id: String,
    pub request_ms: u64,
    pub status_code: u16,
    pub etag: Option<String>,
    pub cache_control: Option<String>,
}

impl From<&FetchMeta> for Value {
    fn from(meta: &FetchMeta) -> Self {
        json!({
            "raw_id": meta.raw_id,
            "request_ms": meta.request_ms,
            "status_code": meta.status_code,
            "etag": meta.etag.as_deref().unwrap_or_default(),
            "cache_control": meta.cache_control.as_deref().unwrap_or_default(),
        })
    }
}

/// The outcome of one successful `fetch_rates` call.
#[derive(Debug, Clone, Default)]
pub struct SourceFetch {
    pub rates: BTreeMap<PairKey, f64>,
    pub meta: BTreeMap<PairKey, FetchMeta>,
    pub fetched_at: DateTime<Utc>,
}

impl SourceFetch {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self {
            rates: BTreeMap::new(),
            meta: BTreeMap::new(),
            fetched_at,
        }
    }

    pub fn insert(&mut self, pair: PairKey, rate: f64, meta: FetchMeta) {
        self.rates.insert(pair.clone(), rate);
        self.meta.insert(pair, meta);
    }

    pub fn meta_json(&self, pair: &PairKey) -> Value {
        self.meta
            .get(pair)
            .map(Value::from)
            .unwrap_or_else(|| json!({}))
    }
}

/// An external provider of rates, all quoted against one currency.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Short identifier accepted by source filters, e.g. `coingecko`.
    fn id(&self) -> &str;

    /// Display name recorded in the cache and history.
    fn name(&self) -> &str;

    /// The currency every produced pair is quoted in, e.g. `USD` for `BTC_USD`.
    fn quote_currency(&self) -> &str;

    /// Whether `fetch_rates` produces `(code, quote_currency)`.
    fn covers(&self, code: &str) -> bool;

    async fn fetch_rates(&self) -> Result<SourceFetch>;
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::error::RateError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A source returning a fixed table, or failing, and counting its calls.
    pub(crate) struct StubSource {
        pub id: String,
        pub name: String,
        pub quote: String,
        pub rates: BTreeMap<PairKey, f64>,
        pub fetched_at: DateTime<Utc>,
        pub fail: bool,
        pub calls: AtomicUsize,
        /// Moves this clock forward on every fetch.
        pub advance: Option<(Arc<ManualClock>, chrono::Duration)>,
    }

    impl StubSource {
        pub(crate) fn new(id: &str, quote: &str, rates: &[(&str, f64)], at: DateTime<Utc>) -> Self {
            Self {
                id: id.to_string(),
                name: format!("{id}-name"),
                quote: quote.to_string(),
                rates: rates
                    .iter()
                    .map(|(pair, rate)| (pair.parse().unwrap(), *rate))
                    .collect(),
                fetched_at: at,
                fail: false,
                calls: AtomicUsize::new(0),
                advance: None,
            }
        }

        pub(crate) fn advancing(mut self, clock: Arc<ManualClock>, by: chrono::Duration) -> Self {
            self.advance = Some((clock, by));
            self
        }

        pub(crate) fn failing(id: &str, quote: &str) -> Self {
            let mut stub = Self::new(id, quote, &[], DateTime::<Utc>::UNIX_EPOCH);
            stub.fail = true;
            stub
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceClient for StubSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn quote_currency(&self) -> &str {
            &self.quote
        }

        fn covers(&self, code: &str) -> bool {
            self.rates.keys().any(|pair| pair.from_code() == code)
        }

        async fn fetch_rates(&self) -> Result<SourceFetch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((clock, by)) = &self.advance {
                clock.advance(*by);
            }
            if self.fail {
                return Err(RateError::source_fetch(&self.name, "connection refused"));
            }
            let mut fetch = SourceFetch::new(self.fetched_at);
            for (pair, rate) in &self.rates {
                fetch.insert(
                    pair.clone(),
                    *rate,
                    FetchMeta {
                        raw_id: pair.from_code().to_lowercase(),
                        request_ms: 1,
                        status_code: 200,
                        etag: None,
                        cache_control: None,
                    },
                );
            }
            Ok(fetch)
        }
    }
}
