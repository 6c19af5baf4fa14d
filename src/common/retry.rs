//! Retry with exponential backoff
//!
//! Wraps a single exchange call. Each failure is classified once through
//! [`ExchangeError::disposition`]:
//!
//! - `Retriable` (rate limit, network): back off `backoff_factor ^ attempt`
//!   seconds and try again, sharing one attempt counter across both kinds
//! - `NonRetriable` / `Fatal`: returned to the caller untouched, no sleep
//!
//! At most `max_retries` attempts are made per call. When they are used up
//! the caller gets [`ExchangeError::RetriesExhausted`] with the last error
//! as its source.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use binance_data::common::{RetryConfig, RetryPolicy};
//!
//! let policy = RetryPolicy::new(RetryConfig::default());
//! assert_eq!(policy.delay_for(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(4));
//!
//! let price = policy.call("latest_price", || Ok::<_, binance_data::ExchangeError>(42.0));
//! assert_eq!(price.unwrap(), 42.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, warn};

use crate::binance::{AccountInfo, RawKline, TickerPrice};
use crate::error::{ConfigError, Disposition, ExchangeError};
use crate::exchange::ExchangeGateway;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call (including the first)
    pub max_retries: u32,
    /// Delay after the k-th failure is `backoff_factor ^ k` seconds
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Set maximum attempts
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the exponential base of the backoff
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::invalid(
                "retry.max_retries",
                "must be at least 1",
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::invalid(
                "retry.backoff_factor",
                format!("must be a finite number >= 1.0, got {}", self.backoff_factor),
            ));
        }
        Ok(())
    }
}

/// Blocks the current thread between attempts
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Executes exchange calls under a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy<S = ThreadSleeper> {
    config: RetryConfig,
    sleeper: S,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<S: Sleeper> RetryPolicy<S> {
    /// Create a policy with a custom sleeper
    pub fn with_sleeper(config: RetryConfig, sleeper: S) -> Self {
        Self { config, sleeper }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Attempts allowed per call; never less than one
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.max(1)
    }

    /// Delay slept after the `attempt`-th failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.config.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Run `op`, retrying transient failures with exponential backoff
    pub fn call<T, F>(&self, operation: &str, mut op: F) -> Result<T, ExchangeError>
    where
        F: FnMut() -> Result<T, ExchangeError>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0u32;

        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let kind = match err.disposition() {
                Disposition::Retriable(kind) => kind,
                Disposition::NonRetriable => {
                    warn!("{}: exchange error (non-retriable): {}", operation, err);
                    return Err(err);
                }
                Disposition::Fatal => {
                    error!("{}: unexpected error: {}", operation, err);
                    return Err(err);
                }
            };

            attempt += 1;
            if attempt >= max_attempts {
                error!(
                    "{}: max retries reached for {} ({}). Aborting.",
                    operation, kind, err
                );
                return Err(ExchangeError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                "{}: {} ({}). Retrying in {:.1} seconds... (attempt {}/{})",
                operation,
                kind,
                err,
                delay.as_secs_f64(),
                attempt,
                max_attempts
            );
            self.sleeper.sleep(delay);
        }
    }
}

/// Gateway decorator that runs every call through a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryingGateway<G, S = ThreadSleeper> {
    inner: G,
    policy: RetryPolicy<S>,
}

impl<G: ExchangeGateway> RetryingGateway<G> {
    pub fn new(inner: G, config: RetryConfig) -> Self {
        Self::with_policy(inner, RetryPolicy::new(config))
    }
}

impl<G: ExchangeGateway, S: Sleeper> RetryingGateway<G, S> {
    pub fn with_policy(inner: G, policy: RetryPolicy<S>) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy<S> {
        &self.policy
    }
}

impl<G: ExchangeGateway, S: Sleeper> ExchangeGateway for RetryingGateway<G, S> {
    fn account_info(&self) -> Result<AccountInfo, ExchangeError> {
        self.policy.call("account_info", || self.inner.account_info())
    }

    fn historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawKline>, ExchangeError> {
        self.policy.call("historical_klines", || {
            self.inner.historical_klines(symbol, interval, start, end)
        })
    }

    fn latest_price(&self, symbol: &str) -> Result<TickerPrice, ExchangeError> {
        self.policy
            .call("latest_price", || self.inner.latest_price(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.borrow_mut().push(duration);
        }
    }

    fn rate_limited() -> ExchangeError {
        ExchangeError::from_status(429, Some(-1003), "Too many requests")
    }

    /// Replays `script` in order, then succeeds forever
    fn scripted(
        script: Vec<ExchangeError>,
    ) -> (Cell<u32>, RefCell<VecDeque<ExchangeError>>) {
        (Cell::new(0), RefCell::new(script.into()))
    }

    fn run(
        config: RetryConfig,
        script: Vec<ExchangeError>,
    ) -> (Result<&'static str, ExchangeError>, u32, Vec<Duration>) {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::with_sleeper(config, &sleeper);
        let (calls, queue) = scripted(script);

        let result = policy.call("test_op", || {
            calls.set(calls.get() + 1);
            match queue.borrow_mut().pop_front() {
                Some(err) => Err(err),
                None => Ok("ok"),
            }
        });

        let delays = sleeper.delays.borrow().clone();
        (result, calls.get(), delays)
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_factor, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RetryConfig::default()
            .with_max_retries(5)
            .with_backoff_factor(1.5);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_factor, 1.5);
    }

    #[test]
    fn test_config_validation() {
        assert!(RetryConfig::default().with_max_retries(0).validate().is_err());
        assert!(RetryConfig::default()
            .with_backoff_factor(0.5)
            .validate()
            .is_err());
        assert!(RetryConfig::default()
            .with_backoff_factor(f64::NAN)
            .validate()
            .is_err());
        assert!(RetryConfig::default()
            .with_backoff_factor(1.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_delay_is_power_of_factor() {
        let policy = RetryPolicy::new(RetryConfig::default());
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));

        let policy = RetryPolicy::new(RetryConfig::default().with_backoff_factor(1.5));
        assert_eq!(policy.delay_for(2), Duration::from_secs_f64(2.25));
    }

    #[test]
    fn test_success_needs_no_retry() {
        let (result, calls, delays) = run(RetryConfig::default(), vec![]);
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 1);
        assert!(delays.is_empty());
    }

    #[test]
    fn test_rate_limit_twice_then_success() {
        let (result, calls, delays) =
            run(RetryConfig::default(), vec![rate_limited(), rate_limited()]);

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 3);
        assert_eq!(delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[test]
    fn test_ip_ban_status_is_retried() {
        let (result, calls, delays) = run(
            RetryConfig::default(),
            vec![ExchangeError::from_status(418, Some(-1003), "banned")],
        );
        assert!(result.is_ok());
        assert_eq!(calls, 2);
        assert_eq!(delays, vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_exhaustion_returns_distinct_error() {
        let (result, calls, delays) = run(
            RetryConfig::default(),
            vec![rate_limited(), rate_limited(), rate_limited(), rate_limited()],
        );

        assert_eq!(calls, 3);
        assert_eq!(delays.len(), 2);
        match result {
            Err(ExchangeError::RetriesExhausted {
                operation,
                attempts,
                source,
            }) => {
                assert_eq!(operation, "test_op");
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ExchangeError::RateLimited { status: 429, .. }));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_network_and_rate_limit_share_counter() {
        let (result, calls, delays) = run(
            RetryConfig::default(),
            vec![
                ExchangeError::Network("connection reset".into()),
                rate_limited(),
                ExchangeError::Timeout("operation timed out".into()),
            ],
        );

        assert_eq!(calls, 3);
        assert_eq!(delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        match result {
            Err(ExchangeError::RetriesExhausted { source, .. }) => {
                assert!(matches!(*source, ExchangeError::Timeout(_)));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_non_retriable_fails_fast() {
        let (result, calls, delays) = run(
            RetryConfig::default(),
            vec![ExchangeError::from_status(400, Some(-1121), "Invalid symbol.")],
        );

        assert_eq!(calls, 1);
        assert!(delays.is_empty());
        assert!(matches!(
            result,
            Err(ExchangeError::Api {
                status: 400,
                code: Some(-1121),
                ..
            })
        ));
    }

    #[test]
    fn test_fatal_fails_fast() {
        let (result, calls, delays) = run(
            RetryConfig::default(),
            vec![ExchangeError::Decode("expected value at line 1".into())],
        );

        assert_eq!(calls, 1);
        assert!(delays.is_empty());
        assert!(matches!(result, Err(ExchangeError::Decode(_))));
    }

    #[test]
    fn test_non_retriable_after_transient_stops_immediately() {
        let (result, calls, delays) = run(
            RetryConfig::default(),
            vec![
                rate_limited(),
                ExchangeError::from_status(401, Some(-2015), "Invalid API-key"),
            ],
        );

        assert_eq!(calls, 2);
        assert_eq!(delays, vec![Duration::from_secs(2)]);
        assert!(matches!(result, Err(ExchangeError::Api { status: 401, .. })));
    }

    #[test]
    fn test_attempts_never_exceed_ceiling() {
        for max_retries in 1..=6u32 {
            for factor in [1.0, 2.0, 3.0] {
                let config = RetryConfig::default()
                    .with_max_retries(max_retries)
                    .with_backoff_factor(factor);
                let script = (0..10).map(|_| rate_limited()).collect();

                let (result, calls, delays) = run(config, script);

                assert!(result.is_err());
                assert_eq!(calls, max_retries);
                assert_eq!(delays.len() as u32, max_retries - 1);
                for (i, delay) in delays.iter().enumerate() {
                    let k = i as i32 + 1;
                    assert_eq!(*delay, Duration::from_secs_f64(factor.powi(k)));
                }
            }
        }
    }

    #[test]
    fn test_zero_max_retries_still_attempts_once() {
        let (result, calls, delays) =
            run(RetryConfig::default().with_max_retries(0), vec![rate_limited()]);

        assert_eq!(calls, 1);
        assert!(delays.is_empty());
        assert!(matches!(
            result,
            Err(ExchangeError::RetriesExhausted { attempts: 1, .. })
        ));
    }
}
