//! Common utilities shared across exchange clients
//!
//! - Retry logic with exponential backoff, driven by the error
//!   classification in [`crate::error::Disposition`]

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryingGateway, Sleeper, ThreadSleeper};
