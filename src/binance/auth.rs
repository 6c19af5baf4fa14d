//! Authentication utilities for the Binance API
//!
//! Signed endpoints take an HMAC-SHA256 of the full query string, keyed
//! with the API secret and hex encoded, as the `signature` parameter. The
//! API key travels in the `X-MBX-APIKEY` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::ConfigError;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_VAR: &str = "BINANCE_API_KEY";
pub const API_SECRET_VAR: &str = "BINANCE_API_SECRET";

/// Generate HMAC-SHA256 signature for a query string
///
/// # Example
///
/// ```
/// use binance_data::binance::auth::sign_request;
///
/// let signature = sign_request("symbol=BTCUSDT&timestamp=1499827319559", "secret");
/// assert_eq!(signature.len(), 64);
/// ```
pub fn sign_request(query: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature against the expected value
pub fn verify_signature(query: &str, secret: &str, signature: &str) -> bool {
    let computed = sign_request(query, secret);
    constant_time_eq(computed.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// API key and secret
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load `BINANCE_API_KEY` / `BINANCE_API_SECRET`, reading `.env` first
    /// if present. Missing or blank values are a configuration error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };

        let api_key = read(API_KEY_VAR)?;
        let api_secret = read(API_SECRET_VAR)?;
        Ok(Self::new(api_key, api_secret))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Sign a query string with the secret
    pub fn sign(&self, query: &str) -> String {
        sign_request(query, &self.api_secret)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.chars().count() > 8 {
            let head: String = self.api_key.chars().take(4).collect();
            let mut tail: Vec<char> = self.api_key.chars().rev().take(4).collect();
            tail.reverse();
            format!("{}...{}", head, tail.into_iter().collect::<String>())
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("Credentials")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}
