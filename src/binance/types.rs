//! Binance API types for account, ticker and kline data

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One kline row exactly as Binance returns it:
/// `[open_time, open, high, low, close, volume, close_time,
///   quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]`
///
/// Prices and volumes arrive as strings, times and trade counts as numbers.
pub type RawKline = Vec<serde_json::Value>;

/// Open time (epoch ms) of a raw kline row
pub fn kline_open_time(row: &[serde_json::Value]) -> Option<i64> {
    row.first().and_then(serde_json::Value::as_i64)
}

/// Asset balance on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    pub fn is_zero(&self) -> bool {
        self.free.is_zero() && self.locked.is_zero()
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (Free), {} (Locked)",
            self.asset, self.free, self.locked
        )
    }
}

/// Response of `GET /api/v3/account`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: bool,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub update_time: i64,
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    /// Balances for the given assets, in account order
    pub fn balances_for(&self, assets: &[impl AsRef<str>]) -> Vec<&Balance> {
        self.balances
            .iter()
            .filter(|b| assets.iter().any(|a| a.as_ref().eq_ignore_ascii_case(&b.asset)))
            .collect()
    }

    pub fn non_zero_balances(&self) -> Vec<&Balance> {
        self.balances.iter().filter(|b| !b.is_zero()).collect()
    }
}

/// Response of `GET /api/v3/ticker/price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Error body Binance attaches to non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Valid Binance intervals
pub const BINANCE_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

/// Check if interval is valid for Binance
pub fn is_valid_interval(interval: &str) -> bool {
    BINANCE_INTERVALS.contains(&interval)
}
