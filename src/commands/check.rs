//! Check command implementation

use anyhow::{Context, Result};
use binance_data::{Config, ExchangeGateway};
use tracing::info;

use super::{connect, split_list};

pub fn run(config: &Config, assets_override: Option<String>) -> Result<()> {
    let assets = match assets_override {
        Some(list) => split_list(&list),
        None => config.data.balance_assets.clone(),
    };

    let gateway = connect(config)?;

    info!("Testing connection...");
    let account = gateway
        .account_info()
        .context("Failed to fetch account information")?;

    println!("Connection successful. Account balances:");
    let balances = account.balances_for(assets.as_slice());
    if balances.is_empty() {
        println!("  (no balances for {})", assets.join(", "));
    }
    for balance in balances {
        println!("  - {}", balance);
    }

    info!(
        "Account type {}, {} non-zero balances",
        account.account_type,
        account.non_zero_balances().len()
    );
    Ok(())
}
