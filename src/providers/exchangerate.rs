use super::util::{elapsed_ms, header_value, http_client, request_error};
use crate::core::clock::Clock;
use crate::core::config::{API_KEY_ENV, ExchangeRateConfig};
use crate::core::currency::PairKey;
use crate::core::error::{RateError, Result};
use crate::core::source::{FetchMeta, SourceClient, SourceFetch};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, ETAG};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    rates: HashMap<String, Value>,
}

/// Fiat rates from ExchangeRate-API's latest table for the base currency.
///
/// Upstream quotes `BASE -> CODE`; every rate is inverted into `CODE_BASE`.
pub struct ExchangeRateApiSource {
    base_url: String,
    api_key: Option<String>,
    base: String,
    currencies: Vec<String>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ExchangeRateApiSource {
    pub const ID: &'static str = "exchangerate";
    pub const NAME: &'static str = "ExchangeRate-API";

    pub fn new(
        config: &ExchangeRateConfig,
        api_key: Option<String>,
        base: &str,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ExchangeRateApiSource {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            base: base.to_string(),
            currencies: config.currencies.clone(),
            timeout,
            clock,
        }
    }
}

#[async_trait]
impl SourceClient for ExchangeRateApiSource {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn quote_currency(&self) -> &str {
        &self.base
    }

    fn covers(&self, code: &str) -> bool {
        code != self.base && self.currencies.iter().any(|c| c == code)
    }

    #[instrument(
        name = "ExchangeRateFetch",
        skip(self),
        fields(base = %self.base, currencies = self.currencies.len())
    )]
    async fn fetch_rates(&self) -> Result<SourceFetch> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(RateError::source_fetch(
                Self::NAME,
                format!("Missing API key, set sources.exchangerate.api_key or {API_KEY_ENV}"),
            ));
        };

        let url = format!("{}/{}/latest/{}", self.base_url, api_key, self.base);
        debug!("Requesting latest rates for base {}", self.base);

        let client = http_client(Self::NAME, self.timeout)?;
        let started = Instant::now();
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(Self::NAME, e))?;

        let status = response.status();
        let etag = header_value(&response, ETAG);
        let cache_control = header_value(&response, CACHE_CONTROL);
        let text = response
            .text()
            .await
            .map_err(|e| request_error(Self::NAME, e))?;
        let request_ms = elapsed_ms(started);

        let parsed = serde_json::from_str::<LatestRatesResponse>(&text);
        if !status.is_success() {
            let reason = parsed
                .ok()
                .and_then(|p| p.error_type)
                .map(|e| format!(" ({e})"))
                .unwrap_or_default();
            return Err(RateError::source_fetch(
                Self::NAME,
                format!("HTTP error: {status}{reason}"),
            ));
        }

        let payload = parsed.map_err(|e| {
            RateError::source_fetch(Self::NAME, format!("Failed to parse JSON response: {e}"))
        })?;
        if payload.result != "success" {
            let reason = payload
                .error_type
                .unwrap_or_else(|| "unknown API error".to_string());
            return Err(RateError::source_fetch(Self::NAME, reason));
        }

        let mut fetch = SourceFetch::new(self.clock.now());
        for code in &self.currencies {
            if code == &self.base {
                continue;
            }
            let raw_rate = payload
                .rates
                .get(code)
                .and_then(Value::as_f64)
                .filter(|rate| rate.is_finite() && *rate > 0.0);
            let Some(raw_rate) = raw_rate else {
                debug!(currency = %code, "No usable rate in response");
                continue;
            };

            fetch.insert(
                PairKey::new(code, &self.base)?,
                1.0 / raw_rate,
                FetchMeta {
                    raw_id: code.clone(),
                    request_ms,
                    status_code: status.as_u16(),
                    etag: etag.clone(),
                    cache_control: cache_control.clone(),
                },
            );
        }

        debug!(count = fetch.rates.len(), "Received ExchangeRate-API rates");
        Ok(fetch)
    }
}
