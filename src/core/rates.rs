//! Persisted rate records: cache entries, the cache document and history records.

use crate::core::currency::PairKey;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Formats a timestamp the way every persisted file stores it.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parses RFC 3339 timestamps. Naive timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `now - updated_at <= ttl`. Unparseable timestamps are never fresh.
pub fn is_fresh(updated_at: &str, now: DateTime<Utc>, ttl_seconds: u64) -> bool {
    let Some(updated) = parse_timestamp(updated_at) else {
        return false;
    };
    let ttl = i64::try_from(ttl_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(updated) <= ttl
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub source: String,
}

impl RateEntry {
    pub fn new(rate: f64, updated_at: DateTime<Utc>, source: &str) -> Self {
        Self {
            rate,
            updated_at: format_timestamp(updated_at),
            source: source.to_string(),
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_seconds: u64) -> bool {
        is_fresh(&self.updated_at, now, ttl_seconds)
    }

    pub fn has_valid_rate(&self) -> bool {
        self.rate.is_finite() && self.rate > 0.0
    }
}

/// The rate cache document, `{"pairs": {...}, "last_refresh": ...}`.
///
/// Deserialization is lenient per entry: pairs with an invalid key or rate are
/// dropped, everything else is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RatesCache {
    pub pairs: BTreeMap<PairKey, RateEntry>,
    pub last_refresh: Option<String>,
}

#[derive(Deserialize)]
struct RawRatesCache {
    #[serde(default)]
    pairs: BTreeMap<String, Value>,
    #[serde(default)]
    last_refresh: Value,
}

impl<'de> Deserialize<'de> for RatesCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRatesCache::deserialize(deserializer)?;
        let mut pairs = BTreeMap::new();
        for (key, value) in raw.pairs {
            let entry = key
                .parse::<PairKey>()
                .ok()
                .zip(serde_json::from_value::<RateEntry>(value).ok())
                .filter(|(_, entry)| entry.has_valid_rate());
            match entry {
                Some((pair, entry)) => {
                    pairs.insert(pair, entry);
                }
                None => debug!(key = %key, "Dropping malformed rate cache entry"),
            }
        }
        Ok(RatesCache {
            pairs,
            last_refresh: raw.last_refresh.as_str().map(str::to_string),
        })
    }
}

impl RatesCache {
    pub fn get(&self, pair: &PairKey) -> Option<&RateEntry> {
        self.pairs.get(pair)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs touching `currency` on either side and quoted in `base`.
    ///
    /// With `top`, the highest rates first, otherwise ordered by pair.
    pub fn select(
        &self,
        currency: Option<&str>,
        base: Option<&str>,
        top: Option<usize>,
    ) -> Vec<(&PairKey, &RateEntry)> {
        let mut rows: Vec<_> = self
            .pairs
            .iter()
            .filter(|(pair, _)| currency.is_none_or(|c| pair.involves(c)))
            .filter(|(pair, _)| base.is_none_or(|b| pair.to_code() == b))
            .collect();

        if let Some(top) = top {
            rows.sort_by(|a, b| b.1.rate.total_cmp(&a.1.rate));
            rows.truncate(top);
        }
        rows
    }
}

fn empty_meta() -> Value {
    Value::Object(Map::new())
}

/// One observed rate. `id` is the natural key `FROM_TO_TIMESTAMP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: String,
    pub source: String,
    #[serde(default = "empty_meta")]
    pub meta: Value,
}

impl HistoryRecord {
    pub fn new(
        pair: &PairKey,
        rate: f64,
        timestamp: DateTime<Utc>,
        source: &str,
        meta: Value,
    ) -> Self {
        let timestamp = format_timestamp(timestamp);
        Self {
            id: format!("{pair}_{timestamp}"),
            from_currency: pair.from_code().to_string(),
            to_currency: pair.to_code().to_string(),
            rate,
            timestamp,
            source: source.to_string(),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_timestamp_format_and_parse() {
        let formatted = format_timestamp(t0());
        assert_eq!(formatted, "2024-05-01T12:00:00.000000+00:00");
        assert_eq!(parse_timestamp(&formatted), Some(t0()));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00Z"), Some(t0()));
        assert_eq!(parse_timestamp("2024-05-01T15:00:00+03:00"), Some(t0()));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00"), Some(t0()));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_freshness_boundary_is_inclusive() {
        let updated = format_timestamp(t0());
        assert!(is_fresh(&updated, t0() + Duration::seconds(300), 300));
        assert!(!is_fresh(&updated, t0() + Duration::seconds(301), 300));
        assert!(!is_fresh("not a date", t0(), 300));
        assert!(is_fresh(&updated, t0(), u64::MAX));
    }

    #[test]
    fn test_cache_deserialization_drops_malformed_entries() {
        let json = r#"{
            "pairs": {
                "USD_EUR": {"rate": 0.9, "updated_at": "2024-05-01T12:00:00+00:00", "source": "test"},
                "BTC_USD": {"rate": 60000.0, "updated_at": "garbage", "source": "test"},
                "bad key": {"rate": 1.0, "updated_at": "2024-05-01T12:00:00+00:00"},
                "GBP_USD": {"rate": "1.2"},
                "RUB_USD": {"rate": 0.0, "updated_at": "2024-05-01T12:00:00+00:00"}
            },
            "last_refresh": "2024-05-01T12:00:00+00:00"
        }"#;

        let cache: RatesCache = serde_json::from_str(json).unwrap();
        assert_eq!(cache.pairs.len(), 2);
        assert!(cache.get(&"USD_EUR".parse().unwrap()).is_some());
        // Kept: a bad timestamp only makes the entry stale.
        assert_eq!(
            cache.get(&"BTC_USD".parse().unwrap()).unwrap().updated_at,
            "garbage"
        );
        assert_eq!(
            cache.last_refresh.as_deref(),
            Some("2024-05-01T12:00:00+00:00")
        );
    }

    #[test]
    fn test_cache_serializes_to_file_format() {
        let mut cache = RatesCache::default();
        cache.pairs.insert(
            PairKey::new("USD", "EUR").unwrap(),
            RateEntry::new(0.9, t0(), "ExchangeRate-API"),
        );
        let value = serde_json::to_value(&cache).unwrap();
        assert_eq!(value["pairs"]["USD_EUR"]["rate"], 0.9);
        assert_eq!(
            value["pairs"]["USD_EUR"]["updated_at"],
            "2024-05-01T12:00:00.000000+00:00"
        );
        assert_eq!(value["pairs"]["USD_EUR"]["source"], "ExchangeRate-API");
        assert!(value["last_refresh"].is_null());
    }

    #[test]
    fn test_select_filters_and_top() {
        let mut cache = RatesCache::default();
        for (pair, rate) in [("BTC_USD", 60000.0), ("ETH_USD", 3000.0), ("EUR_USD", 1.08)] {
            cache
                .pairs
                .insert(pair.parse().unwrap(), RateEntry::new(rate, t0(), "test"));
        }
        cache
            .pairs
            .insert("BTC_EUR".parse().unwrap(), RateEntry::new(55000.0, t0(), "test"));

        let btc: Vec<String> = cache
            .select(Some("BTC"), None, None)
            .iter()
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(btc, vec!["BTC_EUR", "BTC_USD"]);

        let top: Vec<String> = cache
            .select(None, Some("USD"), Some(2))
            .iter()
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(top, vec!["BTC_USD", "ETH_USD"]);

        assert!(cache.select(Some("JPY"), None, None).is_empty());
    }

    #[test]
    fn test_history_record_natural_key() {
        let pair = PairKey::new("BTC", "USD").unwrap();
        let record = HistoryRecord::new(&pair, 60000.0, t0(), "CoinGecko", empty_meta());
        assert_eq!(record.id, "BTC_USD_2024-05-01T12:00:00.000000+00:00");
        assert_eq!(record.from_currency, "BTC");
        assert_eq!(record.to_currency, "USD");
    }
}
