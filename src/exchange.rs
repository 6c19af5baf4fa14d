//! Exchange gateway abstraction
//!
//! The three calls the rest of the crate needs from an exchange. The live
//! implementation is [`crate::binance::BinanceClient`]; retries are layered
//! on top by [`crate::common::RetryingGateway`].

use chrono::{DateTime, Utc};

use crate::binance::{AccountInfo, RawKline, TickerPrice};
use crate::error::ExchangeError;

pub trait ExchangeGateway {
    /// Authenticated account snapshot including balances
    fn account_info(&self) -> Result<AccountInfo, ExchangeError>;

    /// Raw k-line rows for `symbol` from `start` up to `end` (or now),
    /// ordered by open time
    fn historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawKline>, ExchangeError>;

    /// Latest traded price for `symbol`
    fn latest_price(&self, symbol: &str) -> Result<TickerPrice, ExchangeError>;
}

impl<G: ExchangeGateway + ?Sized> ExchangeGateway for &G {
    fn account_info(&self) -> Result<AccountInfo, ExchangeError> {
        (**self).account_info()
    }

    fn historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawKline>, ExchangeError> {
        (**self).historical_klines(symbol, interval, start, end)
    }

    fn latest_price(&self, symbol: &str) -> Result<TickerPrice, ExchangeError> {
        (**self).latest_price(symbol)
    }
}

impl<G: ExchangeGateway + ?Sized> ExchangeGateway for Box<G> {
    fn account_info(&self) -> Result<AccountInfo, ExchangeError> {
        (**self).account_info()
    }

    fn historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawKline>, ExchangeError> {
        (**self).historical_klines(symbol, interval, start, end)
    }

    fn latest_price(&self, symbol: &str) -> Result<TickerPrice, ExchangeError> {
        (**self).latest_price(symbol)
    }
}
