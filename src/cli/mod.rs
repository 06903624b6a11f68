//! Terminal front end for the rate engine

pub mod currencies;
pub mod history;
pub mod rates;
pub mod setup;
pub mod ui;
pub mod update;
