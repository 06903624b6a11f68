pub mod coingecko;
pub mod exchangerate;
pub mod util;

use crate::core::clock::Clock;
use crate::core::config::AppConfig;
use crate::core::source::SourceClient;
use coingecko::CoinGeckoSource;
use exchangerate::ExchangeRateApiSource;
use std::sync::Arc;

/// Builds the configured sources in a fixed order: crypto first, then fiat.
pub fn build_sources(config: &AppConfig, clock: Arc<dyn Clock>) -> Vec<Arc<dyn SourceClient>> {
    let mut sources: Vec<Arc<dyn SourceClient>> = Vec::new();
    if let Some(coingecko) = &config.sources.coingecko {
        sources.push(Arc::new(CoinGeckoSource::new(
            coingecko,
            &config.base_currency,
            config.request_timeout(),
            Arc::clone(&clock),
        )));
    }
    if let Some(exchangerate) = &config.sources.exchangerate {
        sources.push(Arc::new(ExchangeRateApiSource::new(
            exchangerate,
            exchangerate.resolved_api_key(),
            &config.base_currency,
            config.request_timeout(),
            Arc::clone(&clock),
        )));
    }
    sources
}
