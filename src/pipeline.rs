//! Fetch, normalize and annotate in one call

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::data::{normalize_klines, NormalizeOptions};
use crate::error::{ConfigError, PipelineError};
use crate::exchange::ExchangeGateway;
use crate::frame::KlineFrame;
use crate::indicators::{annotate, IndicatorSet};

/// Which k-lines to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct KlineQuery {
    pub symbol: String,
    pub interval: String,
    pub start: DateTime<Utc>,
    /// `None` means up to now
    pub end: Option<DateTime<Utc>>,
}

impl KlineQuery {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            start,
            end: None,
        }
    }

    /// The trailing `days` days up to now
    ///
    /// Fails when the start time would fall outside the representable range.
    pub fn last_days(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        days: u32,
    ) -> Result<Self, ConfigError> {
        let start = Duration::try_days(i64::from(days))
            .and_then(|span| Utc::now().checked_sub_signed(span))
            .ok_or_else(|| {
                ConfigError::invalid("data.days_back", format!("{} days back is out of range", days))
            })?;
        Ok(Self::new(symbol, interval, start))
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}

/// Fetch k-lines and normalize them into a frame
pub fn fetch_frame<G: ExchangeGateway>(
    gateway: &G,
    query: &KlineQuery,
    options: &NormalizeOptions,
) -> Result<KlineFrame, PipelineError> {
    let rows = gateway.historical_klines(&query.symbol, &query.interval, query.start, query.end)?;
    info!(
        "Fetched {} k-lines for {} ({})",
        rows.len(),
        query.symbol,
        query.interval
    );
    Ok(normalize_klines(&rows, options)?)
}

/// Fetch k-lines, normalize them and add indicator columns
///
/// Indicator parameters are checked before any request is made.
pub fn fetch_annotated<G: ExchangeGateway>(
    gateway: &G,
    query: &KlineQuery,
    options: &NormalizeOptions,
    indicators: &IndicatorSet,
) -> Result<KlineFrame, PipelineError> {
    indicators.validate()?;
    let frame = fetch_frame(gateway, query, options)?;
    Ok(annotate(frame, indicators)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_last_days() {
        let before = Utc::now();
        let query = KlineQuery::last_days("BTCUSDT", "1h", 2).unwrap();
        let elapsed = before - query.start;
        assert!(elapsed >= Duration::days(2) - Duration::seconds(1));
        assert!(elapsed <= Duration::days(2) + Duration::seconds(1));
        assert_eq!(query.end, None);
    }

    #[test]
    fn test_last_days_out_of_range_is_error() {
        let err = KlineQuery::last_days("BTCUSDT", "1h", u32::MAX).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "data.days_back"));
    }

    #[test]
    fn test_with_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let query = KlineQuery::new("ETHUSDT", "4h", start).with_end(end);
        assert_eq!(query.start, start);
        assert_eq!(query.end, Some(end));
    }
}
