//! Binance Spot API client
//!
//! - [`auth`]: credentials and HMAC-SHA256 request signing
//! - [`client`]: blocking REST client implementing [`crate::ExchangeGateway`]
//! - [`types`]: response types (account, balances, ticker, raw klines)

pub mod auth;
pub mod client;
pub mod types;

pub use auth::Credentials;
pub use client::{BinanceClient, ClientConfig, MAINNET_API_URL, TESTNET_API_URL};
pub use types::*;
