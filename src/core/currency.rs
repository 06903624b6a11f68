//! Currency codes, directional pair keys and the conversion abstraction

use crate::core::error::{RateError, Result};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;

/// Normalizes a currency code to uppercase and checks it is 2-5 ASCII letters or digits.
pub fn normalize_currency_code(code: &str) -> Result<String> {
    let normalized = code.trim().to_ascii_uppercase();
    let valid = (2..=5).contains(&normalized.len())
        && normalized.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(RateError::InvalidCurrency(code.to_string()));
    }
    Ok(normalized)
}

pub fn validate_amount(amount: f64) -> Result<f64> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(RateError::InvalidAmount(amount))
    }
}

/// A directional currency pair. `USD_EUR` and `EUR_USD` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    from: String,
    to: String,
}

impl PairKey {
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Ok(Self {
            from: normalize_currency_code(from)?,
            to: normalize_currency_code(to)?,
        })
    }

    pub fn from_code(&self) -> &str {
        &self.from
    }

    pub fn to_code(&self) -> &str {
        &self.to
    }

    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn involves(&self, code: &str) -> bool {
        self.from == code || self.to == code
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.from, self.to)
    }
}

impl FromStr for PairKey {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = s
            .split_once('_')
            .ok_or_else(|| RateError::InvalidCurrency(s.to_string()))?;
        PairKey::new(from, to)
    }
}

impl Serialize for PairKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PairKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Plain rate lookup for callers that only need the number.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> AnyResult<f64>;
}
