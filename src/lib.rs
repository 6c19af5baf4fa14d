//! Binance Market Data
//!
//! Pulls account balances, latest prices and historical k-lines from the
//! Binance Spot REST API, retrying rate limits and network failures with
//! exponential backoff, and turns k-lines into a typed, time-indexed table
//! with optional SMA, EMA and RSI columns.
//!
//! The layers are independent:
//!
//! - [`exchange::ExchangeGateway`]: the three exchange calls, implemented
//!   by [`binance::BinanceClient`]
//! - [`common::RetryingGateway`]: retry/backoff around any gateway
//! - [`data::normalize_klines`]: raw rows to [`frame::KlineFrame`]
//! - [`indicators::annotate`]: indicator columns computed from `Close`
//! - [`pipeline::fetch_annotated`]: all of the above in one call

pub mod binance;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod frame;
pub mod indicators;
pub mod pipeline;

pub use binance::{AccountInfo, Balance, BinanceClient, Credentials, RawKline, TickerPrice};
pub use common::{RetryConfig, RetryPolicy, RetryingGateway};
pub use config::Config;
pub use data::{normalize_klines, ColumnSelection, NormalizeOptions};
pub use error::{
    ConfigError, DataError, Disposition, ExchangeError, IndicatorError, PipelineError,
    TransientKind,
};
pub use exchange::ExchangeGateway;
pub use frame::{Column, FrameIndex, KlineFrame};
pub use indicators::{annotate, IndicatorKind, IndicatorParams, IndicatorSet};
pub use pipeline::{fetch_annotated, KlineQuery};
