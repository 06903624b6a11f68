use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xrate::cli::history::HistoryFilter;
use xrate::cli::rates::RatesFilter;
use xrate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for xrate::AppCommand {
    fn from(cmd: Commands) -> xrate::AppCommand {
        match cmd {
            Commands::GetRate { from, to } => xrate::AppCommand::GetRate { from, to },
            Commands::Convert { amount, from, to } => {
                xrate::AppCommand::Convert { amount, from, to }
            }
            Commands::UpdateRates { source } => xrate::AppCommand::UpdateRates { source },
            Commands::ShowRates {
                currency,
                base,
                top,
            } => xrate::AppCommand::ShowRates(RatesFilter {
                currency,
                base,
                top,
            }),
            Commands::History { from, to, limit } => {
                xrate::AppCommand::History(HistoryFilter { from, to, limit })
            }
            Commands::Schedule { interval } => xrate::AppCommand::Schedule {
                interval_seconds: interval,
            },
            Commands::Currencies => xrate::AppCommand::Currencies,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the current rate for a currency pair
    GetRate {
        /// Source currency code, e.g. USD
        #[arg(long)]
        from: String,
        /// Target currency code, e.g. BTC
        #[arg(long)]
        to: String,
    },
    /// Convert an amount between two currencies
    Convert {
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Fetch fresh rates from the configured sources
    UpdateRates {
        /// Only update from this source (coingecko or exchangerate)
        #[arg(long)]
        source: Option<String>,
    },
    /// List cached rates
    ShowRates {
        /// Only pairs involving this currency
        #[arg(long)]
        currency: Option<String>,
        /// Only pairs quoted in this currency
        #[arg(long)]
        base: Option<String>,
        /// Show the N highest rates
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show recorded rate history
    History {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Maximum number of records to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List the currencies the configured sources can quote
    Currencies,
    /// Keep the cache updated periodically until Ctrl+C
    Schedule {
        /// Seconds between updates, defaults to update_interval_seconds
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xrate::cli::setup::setup(),
        Some(cmd) => xrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
