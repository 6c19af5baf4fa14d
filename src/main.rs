//! Binance market data - main entry point
//!
//! This binary provides three subcommands:
//! - check: Test the connection and print account balances
//! - fetch: Download k-lines, normalize them and add indicators
//! - price: Print the latest price for a symbol

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "binance-data")]
#[command(about = "Binance account, price and k-line data with retry/backoff and indicators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a JSON configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use Binance production instead of the testnet
    #[arg(long, global = true)]
    mainnet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Test the connection and show account balances
    Check {
        /// Assets to show (comma-separated). E.g., "USDT,BTC"
        #[arg(short, long)]
        assets: Option<String>,
    },

    /// Fetch historical k-lines with indicators
    Fetch {
        /// Trading pair. E.g., "BTCUSDT"
        #[arg(short, long)]
        symbol: Option<String>,

        /// K-line interval. E.g., "1h", "4h", "1d"
        #[arg(short, long)]
        interval: Option<String>,

        /// Number of days of history to fetch
        #[arg(short, long)]
        days: Option<u32>,

        /// Indicators to add (comma-separated), or "none". E.g., "sma,rsi"
        #[arg(long)]
        indicators: Option<String>,

        /// Length used for every indicator
        #[arg(short, long)]
        length: Option<usize>,

        /// Keep every k-line column instead of OHLCV only
        #[arg(long)]
        all_columns: bool,

        /// Number of rows to print
        #[arg(long, default_value = "5")]
        head: usize,

        /// Save the table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the latest price for a symbol
    Price {
        /// Trading pair. E.g., "BTCUSDT"
        #[arg(short, long)]
        symbol: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Check { .. } => "check",
        Commands::Fetch { .. } => "fetch",
        Commands::Price { .. } => "price",
    };

    setup_logging(cli.verbose, command_name)?;

    let config = commands::load_config(cli.config.as_deref(), cli.mainnet)?;

    match cli.command {
        Commands::Check { assets } => commands::check::run(&config, assets),

        Commands::Fetch {
            symbol,
            interval,
            days,
            indicators,
            length,
            all_columns,
            head,
            output,
        } => commands::fetch::run(
            config,
            commands::fetch::FetchArgs {
                symbol,
                interval,
                days,
                indicators,
                length,
                all_columns,
                head,
                output,
            },
        ),

        Commands::Price { symbol } => commands::price::run(&config, symbol),
    }
}
