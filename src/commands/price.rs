//! Price command implementation

use anyhow::{Context, Result};
use binance_data::{Config, ExchangeGateway};
use tracing::info;

use super::connect;

pub fn run(config: &Config, symbol: Option<String>) -> Result<()> {
    let symbol = symbol.unwrap_or_else(|| config.data.symbol.clone());
    let gateway = connect(config)?;

    info!("Fetching latest price for {}...", symbol);
    let ticker = gateway
        .latest_price(&symbol)
        .with_context(|| format!("Failed to fetch latest price for {}", symbol))?;

    println!("{}: {}", ticker.symbol, ticker.price);
    Ok(())
}
