//! Error taxonomy for the rate engine.

use crate::core::currency::PairKey;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the rate engine.
///
/// Validation variants are raised before any I/O happens. `SourceFetch` is
/// recoverable per source during a full update. Storage variants are fatal and
/// always propagate to the caller.
#[derive(Error, Debug)]
pub enum RateError {
    #[error("Invalid currency code '{0}': expected 2-5 characters A-Z or 0-9")]
    InvalidCurrency(String),

    #[error("Unknown currency '{code}'. Supported currencies: {supported}")]
    CurrencyNotFound { code: String, supported: String },

    #[error("Amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("Unknown source '{filter}'. Configured sources: {available}")]
    UnknownSource { filter: String, available: String },

    /// One upstream provider failed: network, timeout, bad payload, missing key.
    #[error("{source_name}: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    #[error("Rate {pair} is currently unavailable: {reason}")]
    Unavailable { pair: PairKey, reason: String },

    #[error("Storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize data for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RateError {
    pub(crate) fn source_fetch(source_name: &str, message: impl Into<String>) -> Self {
        RateError::SourceFetch {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RateError::Storage {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by bad caller input rather than I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RateError::InvalidCurrency(_)
                | RateError::CurrencyNotFound { .. }
                | RateError::InvalidAmount(_)
                | RateError::UnknownSource { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RateError>;
