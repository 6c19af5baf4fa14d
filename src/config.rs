//! Configuration management
//!
//! Handles loading and validation of the JSON configuration file. Every
//! section and field is optional and falls back to its default. API
//! credentials never live here; they come from the environment (see
//! [`crate::binance::Credentials::from_env`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::binance::{is_valid_interval, ClientConfig, MAINNET_API_URL, TESTNET_API_URL};
use crate::common::RetryConfig;
use crate::data::{ColumnSelection, NormalizeOptions};
use crate::error::ConfigError;
use crate::indicators::{IndicatorKind, IndicatorParams, IndicatorSet, DEFAULT_INDICATORS};

/// Binance rejects a `recvWindow` above one minute
const MAX_RECV_WINDOW_MS: u64 = 60_000;

/// Spot k-line history does not go back further than this
pub const MAX_DAYS_BACK: u32 = 3650;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub retry: RetryConfig,
    pub data: DataConfig,
    pub indicators: IndicatorConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.exchange.validate()?;
        self.data.validate()?;
        self.indicators.validate()?;
        Ok(())
    }
}

/// Exchange connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// REST base URL; the testnet unless overridden
    pub base_url: String,
    pub timeout_secs: u64,
    pub recv_window_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        ExchangeConfig {
            base_url: TESTNET_API_URL.to_string(),
            timeout_secs: client.timeout.as_secs(),
            recv_window_ms: client.recv_window_ms,
        }
    }
}

impl ExchangeConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_recv_window(self.recv_window_ms)
    }

    /// Point at Binance production instead of the configured URL
    pub fn use_mainnet(&mut self) {
        self.base_url = MAINNET_API_URL.to_string();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "exchange.base_url",
                format!("'{}' is not an http(s) URL", self.base_url),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("exchange.timeout_secs", "must be at least 1"));
        }
        if self.recv_window_ms == 0 || self.recv_window_ms > MAX_RECV_WINDOW_MS {
            return Err(ConfigError::invalid(
                "exchange.recv_window_ms",
                format!("must be between 1 and {}", MAX_RECV_WINDOW_MS),
            ));
        }
        Ok(())
    }
}

/// What to fetch and how to shape it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub symbol: String,
    pub interval: String,
    pub days_back: u32,
    pub columns: ColumnSelection,
    pub index_by_time: bool,
    /// Assets shown by the balance check
    pub balance_assets: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            days_back: 1,
            columns: ColumnSelection::Essential,
            index_by_time: true,
            balance_assets: ["USDT", "BTC", "ETH", "BNB"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DataConfig {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions::default()
            .with_selection(self.columns)
            .with_index_by_time(self.index_by_time)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("data.symbol", "must not be empty"));
        }
        if !is_valid_interval(&self.interval) {
            return Err(ConfigError::invalid(
                "data.interval",
                format!("'{}' is not a Binance interval", self.interval),
            ));
        }
        if self.days_back == 0 || self.days_back > MAX_DAYS_BACK {
            return Err(ConfigError::invalid(
                "data.days_back",
                format!("must be between 1 and {}", MAX_DAYS_BACK),
            ));
        }
        Ok(())
    }
}

/// Indicators to add after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub enabled: Vec<IndicatorKind>,
    /// Per-indicator parameters; missing entries use the defaults
    pub params: HashMap<IndicatorKind, IndicatorParams>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            enabled: DEFAULT_INDICATORS.to_vec(),
            params: HashMap::new(),
        }
    }
}

impl IndicatorConfig {
    pub fn indicator_set(&self) -> IndicatorSet {
        IndicatorSet::from_kinds(&self.enabled, &self.params)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.indicator_set()
            .validate()
            .map_err(|e| ConfigError::invalid("indicators.params", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.exchange.base_url, TESTNET_API_URL);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff_factor, 2.0);
        assert_eq!(config.data.balance_assets, vec!["USDT", "BTC", "ETH", "BNB"]);
        assert_eq!(config.indicators.indicator_set(), IndicatorSet::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "retry": { "max_retries": 5 },
            "data": { "symbol": "ETHUSDT", "columns": "all" },
            "indicators": { "enabled": ["rsi"], "params": { "RSI": { "length": 7 } } }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_factor, 2.0);
        assert_eq!(config.data.symbol, "ETHUSDT");
        assert_eq!(config.data.interval, "1h");
        assert_eq!(config.data.normalize_options().selection, ColumnSelection::All);

        let set = config.indicators.indicator_set();
        assert_eq!(set.requests().len(), 1);
        assert_eq!(set.requests()[0].column_name(), "RSI_7");
    }

    #[test]
    fn test_unknown_indicator_fails_to_parse() {
        let json = r#"{ "indicators": { "enabled": ["sma", "ichimoku"] } }"#;
        let err = serde_json::from_str::<Config>(json).unwrap_err();
        assert!(err.to_string().contains("ichimoku"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = Config::default();
        config.data.interval = "7m".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key, .. }) if key == "data.interval"
        ));

        let mut config = Config::default();
        config.data.days_back = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key, .. }) if key == "data.days_back"
        ));
        config.data.days_back = MAX_DAYS_BACK;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.exchange.recv_window_ms = 120_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .indicators
            .params
            .insert(IndicatorKind::Sma, IndicatorParams::new(0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key, .. }) if key == "indicators.params"
        ));
    }

    #[test]
    fn test_client_config() {
        let exchange = ExchangeConfig {
            base_url: "http://127.0.0.1:1234".to_string(),
            timeout_secs: 5,
            recv_window_ms: 10_000,
        };
        let client = exchange.client_config();
        assert_eq!(client.base_url, "http://127.0.0.1:1234");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.recv_window_ms, 10_000);
    }

    #[test]
    fn test_use_mainnet() {
        let mut config = Config::default();
        config.exchange.use_mainnet();
        config.validate().unwrap();
        assert_eq!(config.exchange.client_config().base_url, MAINNET_API_URL);
        assert_eq!(config.exchange.recv_window_ms, ExchangeConfig::default().recv_window_ms);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "binance-data-config-{}.json",
            std::process::id()
        ));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{ "data": {{ "interval": "4h", "days_back": 3 }} }}"#).unwrap();
        drop(file);

        let config = Config::load(Some(path.as_path())).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.data.interval, "4h");
        assert_eq!(config.data.days_back, 3);
    }

    #[test]
    fn test_shipped_testnet_config() {
        let config: Config = serde_json::from_str(include_str!("../configs/testnet.json")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.exchange, ExchangeConfig::default());
        assert_eq!(config.data, DataConfig::default());
        assert_eq!(config.indicators.indicator_set(), IndicatorSet::default());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::from_file("/nonexistent/binance-data.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
