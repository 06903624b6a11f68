pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::history::HistoryFilter;
use crate::cli::rates::RatesFilter;
use crate::core::config::AppConfig;
use crate::core::engine::RateEngine;
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

/// A command run against the configured rate engine.
#[derive(Debug, Clone)]
pub enum AppCommand {
    GetRate {
        from: String,
        to: String,
    },
    Convert {
        amount: f64,
        from: String,
        to: String,
    },
    UpdateRates {
        source: Option<String>,
    },
    ShowRates(RatesFilter),
    History(HistoryFilter),
    Schedule {
        interval_seconds: Option<u64>,
    },
    Currencies,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let engine = RateEngine::new(&config)?;

    match command {
        AppCommand::GetRate { from, to } => cli::rates::get_rate(&engine, &from, &to).await,
        AppCommand::Convert { amount, from, to } => {
            cli::rates::convert(&engine, amount, &from, &to).await
        }
        AppCommand::UpdateRates { source } => {
            cli::update::update_rates(&engine, source.as_deref()).await
        }
        AppCommand::ShowRates(filter) => cli::rates::show_rates(&engine, &filter),
        AppCommand::History(filter) => cli::history::show_history(&engine, &filter),
        AppCommand::Currencies => cli::currencies::show_currencies(&engine),
        AppCommand::Schedule { interval_seconds } => {
            let seconds = interval_seconds.unwrap_or(config.update_interval_seconds);
            if seconds == 0 {
                anyhow::bail!("Interval must be greater than zero");
            }
            info!(interval_secs = seconds, "Starting scheduler");
            cli::update::schedule(&engine, Duration::from_secs(seconds)).await
        }
    }
}
