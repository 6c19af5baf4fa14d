//! Subcommand implementations

pub mod check;
pub mod fetch;
pub mod price;

use anyhow::{Context, Result};
use binance_data::{BinanceClient, Config, Credentials, RetryingGateway};
use std::path::Path;
use tracing::{info, warn};

pub fn load_config(path: Option<&Path>, mainnet: bool) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;
    match path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No config file given, using defaults"),
    }
    if mainnet {
        config.exchange.use_mainnet();
        warn!("Using Binance mainnet: {}", config.exchange.base_url);
    }
    Ok(config)
}

/// Build a retrying Binance client; credentials are checked before any request
pub fn connect(config: &Config) -> Result<RetryingGateway<BinanceClient>> {
    let credentials = Credentials::from_env()
        .context("Binance API credentials are required (BINANCE_API_KEY / BINANCE_API_SECRET)")?;
    let client = BinanceClient::with_config(credentials, config.exchange.client_config())
        .context("Failed to create Binance client")?;
    Ok(RetryingGateway::new(client, config.retry))
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
