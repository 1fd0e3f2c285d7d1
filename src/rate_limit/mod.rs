//! Backpressure and retry primitives for calls to external services.
//!
//! - [`RateLimiter`] spaces calls against one resource class.
//! - [`RetryPolicy`] retries classified transient failures with backoff.

mod limiter;
mod retry;

pub use limiter::RateLimiter;
pub use retry::{
    extract_retry_after, is_rate_limit, is_transient, RetryCallback, RetryPolicy, RetryPredicate,
    Retryable,
};
