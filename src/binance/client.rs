//! Binance Spot REST client
//!
//! Blocking HTTP client for the three calls the crate needs (account,
//! historical klines, latest price) plus `ping`/`server_time` helpers.
//! Defaults to the Spot testnet.
//!
//! # Example
//! ```no_run
//! use binance_data::binance::{BinanceClient, ClientConfig, Credentials};
//! use binance_data::ExchangeGateway;
//!
//! # fn main() -> anyhow::Result<()> {
//! let client = BinanceClient::with_config(Credentials::from_env()?, ClientConfig::default())?;
//! let ticker = client.latest_price("BTCUSDT")?;
//! println!("{}: {}", ticker.symbol, ticker.price);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::auth::Credentials;
use super::types::{
    is_valid_interval, kline_open_time, AccountInfo, ApiErrorBody, RawKline, TickerPrice,
};
use crate::error::ExchangeError;
use crate::exchange::ExchangeGateway;

/// Base URL for the Binance Spot testnet
pub const TESTNET_API_URL: &str = "https://testnet.binance.vision/api";

/// Base URL for Binance Spot production
pub const MAINNET_API_URL: &str = "https://api.binance.com/api";

/// Maximum klines per request (Binance limit)
pub const MAX_KLINES_PER_REQUEST: u32 = 1000;

pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout enforced by the HTTP transport
    pub timeout: Duration,
    /// `recvWindow` sent with signed requests (ms)
    pub recv_window_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: TESTNET_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }
}

/// Binance API client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    credentials: Credentials,
    config: ClientConfig,
}

impl BinanceClient {
    /// Create a client against the testnet with default settings
    pub fn new(credentials: Credentials) -> Result<Self, ExchangeError> {
        Self::with_config(credentials, ClientConfig::default())
    }

    pub fn with_config(
        credentials: Credentials,
        config: ClientConfig,
    ) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Unexpected(format!("failed to build HTTP client: {}", e)))?;

        info!("Binance client initialized for {}", config.base_url);

        Ok(Self {
            http,
            credentials,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Public GET (no signature)
    fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        debug!("GET {} {:?}", path, params);

        let response = self.http.get(self.url(path)).query(params).send()?;
        Self::handle_response(response)
    }

    /// Signed GET: appends `timestamp`, `recvWindow` and `signature`
    fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let mut all_params = params.to_vec();
        all_params.push(("timestamp", Self::timestamp_ms().to_string()));
        all_params.push(("recvWindow", self.config.recv_window_ms.to_string()));

        let query = Self::build_query(&all_params);
        let signature = self.credentials.sign(&query);
        let full_url = format!("{}?{}&signature={}", self.url(path), query, signature);

        debug!("GET (signed) {}", path);

        let response = self
            .http
            .get(full_url)
            .header("X-MBX-APIKEY", self.credentials.api_key())
            .send()?;
        Self::handle_response(response)
    }

    fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
        let status = response.status();
        let body = response.text()?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                warn!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::Decode(e.to_string())
            });
        }

        match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(api_err) => Err(ExchangeError::from_status(
                status.as_u16(),
                Some(api_err.code),
                api_err.msg,
            )),
            Err(_) => Err(ExchangeError::from_status(status.as_u16(), None, body)),
        }
    }

    fn normalize_symbol(symbol: &str) -> Result<String, ExchangeError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ExchangeError::InvalidRequest("symbol is empty".to_string()));
        }
        Ok(symbol)
    }

    /// Check server connectivity
    pub fn ping(&self) -> Result<(), ExchangeError> {
        self.public_get::<serde_json::Value>("/v3/ping", &[])
            .map(|_| ())
    }

    /// Get server time
    pub fn server_time(&self) -> Result<DateTime<Utc>, ExchangeError> {
        #[derive(serde::Deserialize)]
        struct TimeResponse {
            #[serde(rename = "serverTime")]
            server_time: i64,
        }

        let resp: TimeResponse = self.public_get("/v3/time", &[])?;
        DateTime::from_timestamp_millis(resp.server_time)
            .ok_or_else(|| ExchangeError::Decode(format!("invalid server time {}", resp.server_time)))
    }

    /// Fetch a single page of klines
    ///
    /// # Arguments
    /// * `symbol` - Binance trading pair (e.g., "BTCUSDT")
    /// * `interval` - Timeframe (e.g., "1h", "4h", "1d")
    /// * `start_time` - Optional start time in milliseconds
    /// * `end_time` - Optional end time in milliseconds
    /// * `limit` - Optional number of klines to fetch (max 1000)
    pub fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<RawKline>, ExchangeError> {
        let symbol = Self::normalize_symbol(symbol)?;
        if !is_valid_interval(interval) {
            return Err(ExchangeError::InvalidRequest(format!(
                "unsupported interval '{}'",
                interval
            )));
        }

        let mut params = vec![("symbol", symbol), ("interval", interval.to_string())];

        if let Some(start) = start_time {
            params.push(("startTime", start.to_string()));
        }

        if let Some(end) = end_time {
            params.push(("endTime", end.to_string()));
        }

        let limit = limit
            .unwrap_or(MAX_KLINES_PER_REQUEST)
            .clamp(1, MAX_KLINES_PER_REQUEST);
        params.push(("limit", limit.to_string()));

        self.public_get("/v3/klines", &params)
    }

    /// Fetch every kline between `start` and `end` by paginating
    ///
    /// Any failed page fails the whole fetch; no partial history is returned.
    pub fn fetch_klines_range(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawKline>, ExchangeError> {
        let start_ms = start.timestamp_millis();
        let end_ms = end.map(|e| e.timestamp_millis());

        if let Some(end_ms) = end_ms {
            if end_ms < start_ms {
                return Err(ExchangeError::InvalidRequest(format!(
                    "end time {} is before start time {}",
                    end_ms, start_ms
                )));
            }
        }

        info!(
            "Fetching historical k-line data for {} with interval {} from {}...",
            symbol, interval, start
        );

        let mut all_klines: Vec<RawKline> = Vec::new();
        let mut current_start = start_ms;

        loop {
            let page = self.get_klines(
                symbol,
                interval,
                Some(current_start),
                end_ms,
                Some(MAX_KLINES_PER_REQUEST),
            )?;

            let page_len = page.len();
            let Some(last_open) = page.last().map(|row| kline_open_time(row)) else {
                break;
            };
            let last_open = last_open.ok_or_else(|| {
                ExchangeError::Decode("kline row without a numeric open time".to_string())
            })?;

            all_klines.extend(page);

            // Move start time to after last candle
            if last_open < current_start {
                break;
            }
            current_start = last_open + 1;

            if page_len < MAX_KLINES_PER_REQUEST as usize {
                break;
            }
            if end_ms.is_some_and(|end| current_start > end) {
                break;
            }
        }

        // Sort and deduplicate
        all_klines.sort_by_key(|row| kline_open_time(row));
        all_klines.dedup_by_key(|row| kline_open_time(row));

        if all_klines.is_empty() {
            warn!(
                "No data found for {} with the specified parameters.",
                symbol
            );
        } else {
            info!(
                "Successfully fetched {} k-lines for {}.",
                all_klines.len(),
                symbol
            );
        }

        Ok(all_klines)
    }
}

impl ExchangeGateway for BinanceClient {
    fn account_info(&self) -> Result<AccountInfo, ExchangeError> {
        debug!("Fetching account information");
        self.signed_get("/v3/account", &[])
    }

    fn historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawKline>, ExchangeError> {
        self.fetch_klines_range(symbol, interval, start, end)
    }

    fn latest_price(&self, symbol: &str) -> Result<TickerPrice, ExchangeError> {
        let symbol = Self::normalize_symbol(symbol)?;
        debug!("Fetching latest price for {}", symbol);
        self.public_get("/v3/ticker/price", &[("symbol", symbol)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BinanceClient {
        BinanceClient::new(Credentials::new("key", "secret")).unwrap()
    }

    #[test]
    fn test_default_config_targets_testnet() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, TESTNET_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.recv_window_ms, 5000);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = BinanceClient::with_config(
            Credentials::new("key", "secret"),
            ClientConfig::default().with_base_url("http://localhost:1234/"),
        )
        .unwrap();
        assert_eq!(client.url("/v3/ping"), "http://localhost:1234/v3/ping");
    }

    #[test]
    fn test_build_query() {
        let query = BinanceClient::build_query(&[
            ("symbol", "BTCUSDT".to_string()),
            ("timestamp", "1499827319559".to_string()),
        ]);
        assert_eq!(query, "symbol=BTCUSDT&timestamp=1499827319559");
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(BinanceClient::normalize_symbol(" btcusdt ").unwrap(), "BTCUSDT");
        assert!(matches!(
            BinanceClient::normalize_symbol("  "),
            Err(ExchangeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_invalid_interval_rejected_before_request() {
        let err = client()
            .get_klines("BTCUSDT", "2d", None, None, None)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidRequest(_)));
    }

    #[test]
    fn test_inverted_range_rejected_before_request() {
        let end = Utc::now();
        let start = end + chrono::Duration::hours(1);
        let err = client()
            .fetch_klines_range("BTCUSDT", "1h", start, Some(end))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidRequest(_)));
    }
}
