//! Error types
//!
//! One `thiserror` enum per concern. `ExchangeError` carries the retry
//! classification used by [`crate::common::retry`].

use thiserror::Error;

/// Why a transient failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// HTTP 429 / 418 from the exchange
    RateLimit,
    /// Connection failure, reset or timeout
    Network,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::RateLimit => write!(f, "rate limit"),
            TransientKind::Network => write!(f, "network error"),
        }
    }
}

/// How the retry loop must treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Back off and try again
    Retriable(TransientKind),
    /// Rejected by the exchange; surface to the caller untouched
    NonRetriable,
    /// Unexpected failure; surface to the caller untouched
    Fatal,
}

/// Failures raised by an exchange gateway call
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("API error (HTTP {status}{}): {message}", .code.map(|c| format!(", code {}", c)).unwrap_or_default())]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<ExchangeError>,
    },
}

impl ExchangeError {
    /// Build the error for a non-2xx HTTP status.
    ///
    /// 429 and 418 (Binance's IP ban warning) are rate limits, everything
    /// else is an API rejection.
    pub fn from_status(status: u16, code: Option<i64>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 | 418 => ExchangeError::RateLimited { status, message },
            _ => ExchangeError::Api {
                status,
                code,
                message,
            },
        }
    }

    /// Classify this error for the retry loop
    pub fn disposition(&self) -> Disposition {
        match self {
            ExchangeError::RateLimited { .. } => Disposition::Retriable(TransientKind::RateLimit),
            ExchangeError::Network(_) | ExchangeError::Timeout(_) => {
                Disposition::Retriable(TransientKind::Network)
            }
            ExchangeError::Api { .. } | ExchangeError::InvalidRequest(_) => {
                Disposition::NonRetriable
            }
            ExchangeError::Decode(_)
            | ExchangeError::Unexpected(_)
            | ExchangeError::RetriesExhausted { .. } => Disposition::Fatal,
        }
    }

    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::RateLimited { status, .. } | ExchangeError::Api { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ExchangeError::Network(err.to_string())
        } else if err.is_decode() {
            ExchangeError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ExchangeError::from_status(status.as_u16(), None, err.to_string())
        } else {
            ExchangeError::Unexpected(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Decode(err.to_string())
    }
}

/// Configuration problems, all raised before any network call
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: set {0} in the environment or .env file")]
    MissingCredential(&'static str),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// K-line normalization failures
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("row {row} has {found} fields, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("required column '{0}' is not in the column list")]
    MissingColumn(String),

    #[error("row {row}: timestamp is not a valid epoch-milliseconds value")]
    InvalidTimestamp { row: usize },

    #[error("row {row}: timestamp is not strictly after the previous row")]
    UnorderedIndex { row: usize },

    #[error("column '{name}' has {found} rows, frame has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("failed to write CSV: {0}")]
    Csv(String),
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::Csv(err.to_string())
    }
}

/// Indicator annotation failures
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("unknown indicator '{0}' (expected one of: sma, ema, rsi)")]
    UnknownIndicator(String),

    #[error("indicator {indicator}: length must be at least 1")]
    InvalidLength { indicator: String },

    #[error("frame has no '{0}' column")]
    MissingColumn(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Failures of the fetch -> normalize -> annotate pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch k-lines: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("failed to normalize k-lines: {0}")]
    Data(#[from] DataError),

    #[error("failed to add indicators: {0}")]
    Indicator(#[from] IndicatorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ExchangeError::from_status(429, Some(-1003), "too many requests"),
            ExchangeError::RateLimited { status: 429, .. }
        ));
        assert!(matches!(
            ExchangeError::from_status(418, None, "banned"),
            ExchangeError::RateLimited { status: 418, .. }
        ));
        assert!(matches!(
            ExchangeError::from_status(400, Some(-1121), "Invalid symbol."),
            ExchangeError::Api {
                status: 400,
                code: Some(-1121),
                ..
            }
        ));
    }

    #[test]
    fn test_disposition() {
        assert_eq!(
            ExchangeError::from_status(429, None, "").disposition(),
            Disposition::Retriable(TransientKind::RateLimit)
        );
        assert_eq!(
            ExchangeError::Network("connection refused".into()).disposition(),
            Disposition::Retriable(TransientKind::Network)
        );
        assert_eq!(
            ExchangeError::Timeout("30s".into()).disposition(),
            Disposition::Retriable(TransientKind::Network)
        );
        assert_eq!(
            ExchangeError::from_status(400, None, "").disposition(),
            Disposition::NonRetriable
        );
        assert_eq!(
            ExchangeError::InvalidRequest("bad interval".into()).disposition(),
            Disposition::NonRetriable
        );
        assert_eq!(
            ExchangeError::Decode("eof".into()).disposition(),
            Disposition::Fatal
        );
    }

    #[test]
    fn test_exhausted_is_never_retried() {
        let err = ExchangeError::RetriesExhausted {
            operation: "latest_price".into(),
            attempts: 3,
            source: Box::new(ExchangeError::from_status(429, None, "slow down")),
        };
        assert_eq!(err.disposition(), Disposition::Fatal);
        assert_eq!(err.to_string(), "latest_price failed after 3 attempts");
    }

    #[test]
    fn test_api_error_display() {
        let err = ExchangeError::from_status(400, Some(-1121), "Invalid symbol.");
        assert_eq!(
            err.to_string(),
            "API error (HTTP 400, code -1121): Invalid symbol."
        );
        assert_eq!(err.status(), Some(400));
    }
}
