use crate::core::currency::normalize_currency_code;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const API_KEY_ENV: &str = "EXCHANGERATE_API_KEY";

fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_assets() -> BTreeMap<String, String> {
    [("BTC", "bitcoin"), ("ETH", "ethereum"), ("SOL", "solana")]
        .into_iter()
        .map(|(code, id)| (code.to_string(), id.to_string()))
        .collect()
}

fn default_exchangerate_url() -> String {
    "https://v6.exchangerate-api.com/v6".to_string()
}

fn default_fiat_currencies() -> Vec<String> {
    ["EUR", "GBP", "RUB"].into_iter().map(String::from).collect()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_ttl_seconds() -> u64 {
    300
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_interval_seconds() -> u64 {
    300
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoConfig {
    #[serde(default = "default_coingecko_url")]
    pub base_url: String,
    /// Currency code to CoinGecko asset id, e.g. `BTC: bitcoin`.
    #[serde(default = "default_assets")]
    pub assets: BTreeMap<String, String>,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: default_coingecko_url(),
            assets: default_assets(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateConfig {
    #[serde(default = "default_exchangerate_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_fiat_currencies")]
    pub currencies: Vec<String>,
}

impl Default for ExchangeRateConfig {
    fn default() -> Self {
        Self {
            base_url: default_exchangerate_url(),
            api_key: None,
            currencies: default_fiat_currencies(),
        }
    }
}

impl ExchangeRateConfig {
    /// The configured key, or the `EXCHANGERATE_API_KEY` environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
    pub coingecko: Option<CoinGeckoConfig>,
    pub exchangerate: Option<ExchangeRateConfig>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            coingecko: Some(CoinGeckoConfig::default()),
            exchangerate: Some(ExchangeRateConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_ttl_seconds")]
    pub rates_ttl_seconds: u64,
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_interval_seconds")]
    pub update_interval_seconds: u64,
    #[serde(default)]
    pub sources: SourcesConfig,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            rates_ttl_seconds: default_ttl_seconds(),
            request_timeout_seconds: default_timeout_seconds(),
            update_interval_seconds: default_interval_seconds(),
            sources: SourcesConfig::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or built-in defaults if there is none.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Self::default().validate();
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "xrate", "xrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "xrate", "xrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn rates_file(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join("rates.json"))
    }

    pub fn history_file(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join("exchange_rates.json"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Normalizes every currency code and rejects unusable settings.
    pub fn validate(mut self) -> Result<Self> {
        self.base_currency = normalize_currency_code(&self.base_currency)?;
        if self.request_timeout_seconds == 0 {
            bail!("request_timeout_seconds must be greater than zero");
        }
        if self.update_interval_seconds == 0 {
            bail!("update_interval_seconds must be greater than zero");
        }

        if let Some(coingecko) = self.sources.coingecko.as_mut() {
            coingecko.assets = std::mem::take(&mut coingecko.assets)
                .into_iter()
                .map(|(code, id)| Ok((normalize_currency_code(&code)?, id.trim().to_string())))
                .collect::<Result<_>>()?;
        }
        if let Some(exchangerate) = self.sources.exchangerate.as_mut() {
            exchangerate.currencies = exchangerate
                .currencies
                .iter()
                .map(|code| normalize_currency_code(code).map_err(anyhow::Error::from))
                .collect::<Result<_>>()?;
        }
        Ok(self)
    }
}
