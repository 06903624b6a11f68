//! Core rate engine: resolution, batch updates and scheduling

pub mod clock;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod log;
pub mod rates;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod source;
pub mod updater;

// Re-export main types for cleaner imports
pub use clock::{Clock, ManualClock, SystemClock};
pub use currency::{CurrencyRateProvider, PairKey};
pub use engine::RateEngine;
pub use error::RateError;
pub use rates::{HistoryRecord, RateEntry, RatesCache};
pub use registry::{Currency, CurrencyKind, CurrencyRegistry};
pub use resolver::{RateOrigin, ResolvedRate};
pub use scheduler::Scheduler;
pub use source::SourceClient;
pub use updater::UpdateSummary;
