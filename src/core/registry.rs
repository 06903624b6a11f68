//! The set of currencies this installation can quote, derived from config.

use crate::core::config::AppConfig;
use crate::core::currency::normalize_currency_code;
use crate::core::error::{RateError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

const KNOWN_NAMES: &[(&str, &str)] = &[
    ("USD", "US Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
    ("RUB", "Russian Ruble"),
    ("JPY", "Japanese Yen"),
    ("CNY", "Chinese Yuan"),
    ("CHF", "Swiss Franc"),
    ("BTC", "Bitcoin"),
    ("ETH", "Ethereum"),
    ("SOL", "Solana"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

impl Display for CurrencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrencyKind::Fiat => write!(f, "FIAT"),
            CurrencyKind::Crypto => write!(f, "CRYPTO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub kind: CurrencyKind,
    /// Upstream identifier, e.g. the CoinGecko asset id.
    pub source_id: Option<String>,
}

impl Currency {
    fn new(code: &str, kind: CurrencyKind, source_id: Option<&str>) -> Self {
        let name = KNOWN_NAMES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, name)| name.to_string())
            .or_else(|| source_id.map(str::to_string))
            .unwrap_or_else(|| code.to_string());
        Self {
            code: code.to_string(),
            name,
            kind,
            source_id: source_id.map(str::to_string),
        }
    }

    /// One-line description, e.g. `[CRYPTO] BTC - Bitcoin (id: bitcoin)`.
    pub fn display_info(&self) -> String {
        let mut info = format!("[{}] {} - {}", self.kind, self.code, self.name);
        if let Some(id) = &self.source_id {
            info.push_str(&format!(" (id: {id})"));
        }
        info
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<String, Currency>,
}

impl CurrencyRegistry {
    /// The base currency, every fiat code and every crypto asset configured.
    /// A code listed both as an asset and as fiat is treated as crypto.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut currencies = BTreeMap::new();
        if let Some(coingecko) = &config.sources.coingecko {
            for (code, id) in &coingecko.assets {
                currencies.insert(
                    code.clone(),
                    Currency::new(code, CurrencyKind::Crypto, Some(id)),
                );
            }
        }
        let fiat = config
            .sources
            .exchangerate
            .iter()
            .flat_map(|e| e.currencies.iter())
            .chain(std::iter::once(&config.base_currency));
        for code in fiat {
            currencies
                .entry(code.clone())
                .or_insert_with(|| Currency::new(code, CurrencyKind::Fiat, None));
        }
        Self { currencies }
    }

    /// Looks up a code after normalizing it.
    pub fn get(&self, code: &str) -> Result<&Currency> {
        let normalized = normalize_currency_code(code)?;
        self.currencies
            .get(&normalized)
            .ok_or_else(|| RateError::CurrencyNotFound {
                code: normalized,
                supported: self.supported_codes().join(", "),
            })
    }

    /// Sorted supported codes.
    pub fn supported_codes(&self) -> Vec<&str> {
        self.currencies.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}
