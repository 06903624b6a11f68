use super::util::{elapsed_ms, header_value, http_client, request_error};
use crate::core::clock::Clock;
use crate::core::config::CoinGeckoConfig;
use crate::core::currency::PairKey;
use crate::core::error::{RateError, Result};
use crate::core::source::{FetchMeta, SourceClient, SourceFetch};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, ETAG};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Crypto asset prices from the CoinGecko simple-price endpoint.
///
/// Produces `(ASSET, QUOTE)` pairs, e.g. `BTC_USD`.
pub struct CoinGeckoSource {
    base_url: String,
    quote: String,
    assets: BTreeMap<String, String>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CoinGeckoSource {
    pub const ID: &'static str = "coingecko";
    pub const NAME: &'static str = "CoinGecko";

    pub fn new(
        config: &CoinGeckoConfig,
        quote: &str,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CoinGeckoSource {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            quote: quote.to_string(),
            assets: config.assets.clone(),
            timeout,
            clock,
        }
    }
}

#[async_trait]
impl SourceClient for CoinGeckoSource {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn quote_currency(&self) -> &str {
        &self.quote
    }

    fn covers(&self, code: &str) -> bool {
        code != self.quote && self.assets.contains_key(code)
    }

    #[instrument(
        name = "CoinGeckoFetch",
        skip(self),
        fields(quote = %self.quote, assets = self.assets.len())
    )]
    async fn fetch_rates(&self) -> Result<SourceFetch> {
        let ids: Vec<&str> = self.assets.values().map(String::as_str).collect();
        let ids = ids.join(",");
        let vs_currency = self.quote.to_lowercase();
        let url = format!("{}/simple/price", self.base_url);
        debug!("Requesting asset prices from {} for {}", url, ids);

        let client = http_client(Self::NAME, self.timeout)?;
        let started = Instant::now();
        let response = client
            .get(&url)
            .query(&[("ids", ids.as_str()), ("vs_currencies", vs_currency.as_str())])
            .send()
            .await
            .map_err(|e| request_error(Self::NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::source_fetch(
                Self::NAME,
                format!("HTTP error: {status}"),
            ));
        }
        let etag = header_value(&response, ETAG);
        let cache_control = header_value(&response, CACHE_CONTROL);

        let text = response
            .text()
            .await
            .map_err(|e| request_error(Self::NAME, e))?;
        let request_ms = elapsed_ms(started);

        let payload: HashMap<String, Value> = serde_json::from_str(&text).map_err(|e| {
            RateError::source_fetch(Self::NAME, format!("Failed to parse JSON response: {e}"))
        })?;

        let mut fetch = SourceFetch::new(self.clock.now());
        for (code, raw_id) in &self.assets {
            if code == &self.quote {
                continue;
            }
            let rate = payload
                .get(raw_id)
                .and_then(|item| item.get(&vs_currency))
                .and_then(Value::as_f64)
                .filter(|rate| rate.is_finite() && *rate > 0.0);
            let Some(rate) = rate else {
                debug!(asset = %raw_id, "No usable price in response");
                continue;
            };

            fetch.insert(
                PairKey::new(code, &self.quote)?,
                rate,
                FetchMeta {
                    raw_id: raw_id.clone(),
                    request_ms,
                    status_code: status.as_u16(),
                    etag: etag.clone(),
                    cache_control: cache_control.clone(),
                },
            );
        }

        debug!(count = fetch.rates.len(), "Received CoinGecko prices");
        Ok(fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(base_url: &str, timeout: Duration) -> CoinGeckoSource {
        let config = CoinGeckoConfig {
            base_url: base_url.to_string(),
            assets: [("BTC", "bitcoin"), ("ETH", "ethereum"), ("SOL", "solana")]
                .into_iter()
                .map(|(c, i)| (c.to_string(), i.to_string()))
                .collect(),
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        CoinGeckoSource::new(&config, "USD", timeout, clock)
    }

    async fn create_mock_server(template: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin,ethereum,solana"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_successful_price_fetch() {
        let mock_response = r#"{
            "bitcoin": {"usd": 60000.5},
            "ethereum": {"usd": 3000},
            "solana": {"eur": 140.0}
        }"#;
        let template = ResponseTemplate::new(200)
            .set_body_string(mock_response)
            .insert_header("ETag", "W/\"abc\"")
            .insert_header("Cache-Control", "max-age=30");
        let mock_server = create_mock_server(template).await;

        let source = source(&mock_server.uri(), Duration::from_secs(5));
        let fetch = source.fetch_rates().await.unwrap();

        assert_eq!(fetch.rates.len(), 2);
        let btc = PairKey::new("BTC", "USD").unwrap();
        assert_eq!(fetch.rates[&btc], 60000.5);
        assert_eq!(fetch.rates[&PairKey::new("ETH", "USD").unwrap()], 3000.0);
        assert_eq!(
            fetch.fetched_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );

        let meta = &fetch.meta[&btc];
        assert_eq!(meta.raw_id, "bitcoin");
        assert_eq!(meta.status_code, 200);
        assert_eq!(meta.etag.as_deref(), Some("W/\"abc\""));
        assert_eq!(meta.cache_control.as_deref(), Some("max-age=30"));
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let mock_server = create_mock_server(ResponseTemplate::new(429)).await;
        let source = source(&mock_server.uri(), Duration::from_secs(5));

        let err = source.fetch_rates().await.unwrap_err();
        assert!(matches!(err, RateError::SourceFetch { .. }));
        assert_eq!(err.to_string(), "CoinGecko: HTTP error: 429 Too Many Requests");
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let template = ResponseTemplate::new(200).set_body_string("[1, 2, 3]");
        let mock_server = create_mock_server(template).await;
        let source = source(&mock_server.uri(), Duration::from_secs(5));

        let err = source.fetch_rates().await.unwrap_err();
        assert!(
            err.to_string()
                .contains("CoinGecko: Failed to parse JSON response")
        );
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let template = ResponseTemplate::new(200)
            .set_body_string("{}")
            .set_delay(Duration::from_millis(500));
        let mock_server = create_mock_server(template).await;
        let source = source(&mock_server.uri(), Duration::from_millis(50));

        let err = source.fetch_rates().await.unwrap_err();
        assert_eq!(err.to_string(), "CoinGecko: Request timed out");
    }

    #[tokio::test]
    async fn test_asset_ids_are_url_encoded() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "wrapped bitcoin&x=1"))
            .and(query_param("vs_currencies", "usd"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"wrapped bitcoin&x=1": {"usd": 59000.0}}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = CoinGeckoConfig {
            base_url: mock_server.uri(),
            assets: [("WBTC".to_string(), "wrapped bitcoin&x=1".to_string())]
                .into_iter()
                .collect(),
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let source = CoinGeckoSource::new(&config, "USD", Duration::from_secs(5), clock);

        let fetch = source.fetch_rates().await.unwrap();
        assert_eq!(fetch.rates[&PairKey::new("WBTC", "USD").unwrap()], 59000.0);
    }

    #[test]
    fn test_covers_configured_assets() {
        let source = source("http://localhost", Duration::from_secs(1));
        assert!(source.covers("BTC"));
        assert!(!source.covers("EUR"));
        assert!(!source.covers("USD"));
        assert_eq!(source.quote_currency(), "USD");
    }
}
