//! Application-facing entry point wiring the stores, sources and workflows.

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::core::currency::{CurrencyRateProvider, validate_amount};
use crate::core::error::Result;
use crate::core::rates::{HistoryRecord, RatesCache};
use crate::core::registry::CurrencyRegistry;
use crate::core::resolver::{RateResolver, ResolvedRate, SourcePairFetcher};
use crate::core::scheduler::Scheduler;
use crate::core::source::SourceClient;
use crate::core::updater::{RatesUpdater, UpdateSummary};
use crate::providers::build_sources;
use crate::store::{HistoryLog, RateCache};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// The result of converting an amount at a resolved rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub converted: f64,
    pub rate: ResolvedRate,
}

pub struct RateEngine {
    ttl_seconds: u64,
    currencies: CurrencyRegistry,
    resolver: RateResolver,
    updater: Arc<RatesUpdater>,
    cache: RateCache,
    history: HistoryLog,
}

impl RateEngine {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sources = build_sources(config, Arc::clone(&clock));
        Self::with_sources(config, sources, clock)
    }

    /// Builds an engine over explicit sources and clock.
    pub fn with_sources(
        config: &AppConfig,
        sources: Vec<Arc<dyn SourceClient>>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let cache = RateCache::new(config.rates_file()?);
        let history = HistoryLog::new(config.history_file()?);
        debug!(
            rates = %cache.path().display(),
            history = %history.path().display(),
            sources = sources.len(),
            "Rate engine ready"
        );

        let fetcher = Arc::new(SourcePairFetcher::new(sources.clone()));
        let resolver = RateResolver::new(cache.clone(), fetcher, Arc::clone(&clock));
        let updater = RatesUpdater::new(sources, cache.clone(), history.clone(), clock);

        Ok(Self {
            ttl_seconds: config.rates_ttl_seconds,
            currencies: CurrencyRegistry::from_config(config),
            resolver,
            updater: Arc::new(updater),
            cache,
            history,
        })
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn currencies(&self) -> &CurrencyRegistry {
        &self.currencies
    }

    /// Resolves a rate between two supported currencies.
    pub async fn resolve(&self, from: &str, to: &str, ttl_seconds: u64) -> Result<ResolvedRate> {
        self.currencies.get(from)?;
        self.currencies.get(to)?;
        self.resolver.resolve(from, to, ttl_seconds).await
    }

    /// Converts `amount` of `from` into `to` using the configured TTL.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion> {
        let amount = validate_amount(amount)?;
        let rate = self.resolve(from, to, self.ttl_seconds).await?;
        Ok(Conversion {
            amount,
            converted: amount * rate.rate,
            rate,
        })
    }

    pub async fn run_update(&self, source_filter: Option<&str>) -> Result<UpdateSummary> {
        self.updater.run_update(source_filter).await
    }

    pub fn read_cache(&self) -> RatesCache {
        self.cache.read()
    }

    pub fn read_history(&self) -> Vec<HistoryRecord> {
        self.history.read()
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.updater))
    }
}

#[async_trait]
impl CurrencyRateProvider for RateEngine {
    async fn get_rate(&self, from: &str, to: &str) -> anyhow::Result<f64> {
        Ok(self.resolve(from, to, self.ttl_seconds).await?.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::error::RateError;
    use crate::core::resolver::RateOrigin;
    use crate::core::source::stub::StubSource;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::{TempDir, tempdir};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn engine(dir: &TempDir, clock: Arc<ManualClock>) -> (RateEngine, Arc<StubSource>) {
        let config = AppConfig {
            data_path: Some(dir.path().to_string_lossy().into_owned()),
            ..AppConfig::default()
        };
        let source = Arc::new(StubSource::new(
            "fiat",
            "USD",
            &[("EUR_USD", 1.25), ("GBP_USD", 1.5)],
            t0(),
        ));
        let sources: Vec<Arc<dyn SourceClient>> = vec![source.clone()];
        let engine = RateEngine::with_sources(&config, sources, clock).unwrap();
        (engine, source)
    }

    #[tokio::test]
    async fn test_update_then_resolve_from_cache() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let (engine, source) = engine(&dir, clock.clone());

        let summary = engine.run_update(None).await.unwrap();
        assert_eq!(summary.updated_count, 2);
        assert_eq!(engine.read_cache().pairs.len(), 2);
        assert_eq!(engine.read_history().len(), 2);

        clock.advance(Duration::seconds(60));
        let direct = engine.resolve("EUR", "USD", 300).await.unwrap();
        assert_eq!(direct.origin, RateOrigin::Cached);
        let inverse = engine.resolve("USD", "GBP", 300).await.unwrap();
        assert_eq!(inverse.origin, RateOrigin::CachedInverse);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_convert_uses_configured_ttl() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let (engine, source) = engine(&dir, clock);

        let conversion = engine.convert(100.0, "eur", "usd").await.unwrap();
        assert!((conversion.converted - 125.0).abs() < 1e-9);
        assert_eq!(conversion.rate.origin, RateOrigin::Fetched);
        assert_eq!(engine.ttl_seconds(), 300);

        let err = engine.convert(-5.0, "EUR", "USD").await.unwrap_err();
        assert!(matches!(err, RateError::InvalidAmount(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_engine_as_currency_rate_provider() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let (engine, _) = engine(&dir, clock);
        let provider: &dyn CurrencyRateProvider = &engine;

        let rate = provider.get_rate("GBP", "EUR").await.unwrap();
        assert!((rate - 1.2).abs() < 1e-9);
        assert_eq!(provider.get_rate("GBP", "GBP").await.unwrap(), 1.0);
        assert!(provider.get_rate("RUB", "USD").await.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_currency_rejected_before_fetch() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let (engine, source) = engine(&dir, clock);

        let err = engine.resolve("JPY", "USD", 300).await.unwrap_err();
        assert!(matches!(err, RateError::CurrencyNotFound { ref code, .. } if code == "JPY"));
        assert!(err.to_string().contains("Supported currencies: BTC, ETH, EUR"));

        let err = engine.convert(10.0, "USD", "jpy").await.unwrap_err();
        assert!(matches!(err, RateError::CurrencyNotFound { .. }));
        assert!(engine.resolve("JPY", "JPY", 300).await.is_err());

        assert_eq!(source.calls(), 0);
        assert_eq!(engine.currencies().len(), 7);
    }
}
