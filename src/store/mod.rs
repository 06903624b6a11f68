//! File-backed persistence for the rate cache and the rate history.

pub mod atomic;
pub mod history;
pub mod rates_cache;

pub use history::HistoryLog;
pub use rates_cache::RateCache;
