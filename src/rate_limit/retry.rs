//! Classified retry with exponential backoff.
//!
//! Errors describe themselves through [`Retryable`]; pure predicates decide
//! whether a failure is worth another attempt and how long the server asked
//! us to wait.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::warn;

/// What the retry classifier can see about a failure.
pub trait Retryable: fmt::Display {
    /// Structured HTTP status, when the failure came from an HTTP response.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Raw `retry-after` header value, when the server sent one.
    fn retry_after_header(&self) -> Option<&str> {
        None
    }
}

static RATE_LIMIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)rate[_ ]limit", r"429", r"(?i)too many requests"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

static SERVER_ERROR_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b5\d{2}\b").ok());

static TRY_AGAIN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)try again in (\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b").ok()
});

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "econnreset",
    "econnrefused",
    "socket hang up",
];

/// True when the failure is a rate-limit rejection.
///
/// A structured status is authoritative. The message is only consulted when
/// there is none, because it may quote a URL or response body.
pub fn is_rate_limit(err: &dyn Retryable) -> bool {
    if let Some(status) = err.status() {
        return status == 429;
    }
    let message = err.to_string();
    RATE_LIMIT_PATTERNS.iter().any(|re| re.is_match(&message))
}

/// True when the failure is likely to go away on its own.
pub fn is_transient(err: &dyn Retryable) -> bool {
    if let Some(status) = err.status() {
        return status == 429 || status >= 500;
    }
    if is_rate_limit(err) {
        return true;
    }

    let message = err.to_string();
    let lowered = message.to_lowercase();
    if NETWORK_MARKERS.iter().any(|m| lowered.contains(m)) {
        return true;
    }

    SERVER_ERROR_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(&message))
}

/// Server-suggested wait, from a `retry-after` header or a
/// "try again in N seconds" hint in the message.
pub fn extract_retry_after(err: &dyn Retryable) -> Option<Duration> {
    if let Some(ms) = err.retry_after_header().and_then(seconds_to_millis) {
        return Some(Duration::from_millis(ms));
    }

    let message = err.to_string();
    let captures = TRY_AGAIN_PATTERN.as_ref()?.captures(&message)?;
    seconds_to_millis(captures.get(1)?.as_str()).map(Duration::from_millis)
}

/// Convert a decimal seconds string to milliseconds, rounding up.
///
/// Parsed digit-by-digit so "1.1" is exactly 1100, not 1101.
fn seconds_to_millis(value: &str) -> Option<u64> {
    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut millis = whole.checked_mul(1000)?;

    let mut digits = frac.chars().map(|c| c as u64 - '0' as u64);
    let mut scale = 100;
    for _ in 0..3 {
        millis += digits.next().unwrap_or(0) * scale;
        scale /= 10;
    }
    if digits.any(|d| d > 0) {
        millis += 1;
    }
    Some(millis)
}

/// Predicate deciding whether a failure may be retried.
pub type RetryPredicate = Arc<dyn Fn(&dyn Retryable) -> bool + Send + Sync>;

/// Observer fired before each retry sleep with (attempt, delay, error).
pub type RetryCallback = Arc<dyn Fn(u32, Duration, &dyn Retryable) + Send + Sync>;

/// Retry policy: `1 + max_retries` attempts, exponential backoff capped at
/// `max_delay`, stretched to any longer server-suggested wait.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    label: &'static str,
    should_retry: RetryPredicate,
    on_retry: Option<RetryCallback>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("label", &self.label)
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    /// Create a policy retrying transient errors, capped at 30s, doubling.
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            label: "operation",
            should_retry: Arc::new(is_transient),
            on_retry: None,
        }
    }

    /// Profile for third-party web pages and images.
    pub fn external_site() -> Self {
        Self::new(3, Duration::from_millis(2000))
            .with_max_delay(Duration::from_millis(30_000))
            .with_label("external site")
    }

    /// Profile for the generative model API, which rate-limits aggressively.
    pub fn generative_api() -> Self {
        Self::new(5, Duration::from_millis(5000))
            .with_max_delay(Duration::from_millis(120_000))
            .with_label("model API")
            .with_should_retry(|err| is_rate_limit(err) || is_transient(err))
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Replace the transient-error classifier.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Retryable) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Replace the default warning log with a callback.
    pub fn with_on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, Duration, &dyn Retryable) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op`, retrying eligible failures. The last error is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = self.initial_delay;
        let mut attempt = 0u32;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_retries || !(self.should_retry)(&err) {
                return Err(err);
            }
            attempt += 1;

            let delay = match extract_retry_after(&err) {
                Some(suggested) => suggested.max(backoff),
                None => backoff,
            };

            match &self.on_retry {
                Some(callback) => callback(attempt, delay, &err),
                None => warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    self.label,
                    attempt,
                    self.max_attempts(),
                    delay,
                    err
                ),
            }

            tokio::time::sleep(delay).await;

            backoff = Duration::try_from_secs_f64(backoff.as_secs_f64() * self.multiplier)
                .unwrap_or(self.max_delay)
                .min(self.max_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug)]
    struct TestError {
        message: String,
        status: Option<u16>,
        retry_after: Option<String>,
    }

    impl TestError {
        fn msg(message: &str) -> Self {
            Self {
                message: message.to_string(),
                status: None,
                retry_after: None,
            }
        }

        fn with_status(status: u16) -> Self {
            Self {
                message: "request failed".to_string(),
                status: Some(status),
                retry_after: None,
            }
        }
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl Retryable for TestError {
        fn status(&self) -> Option<u16> {
            self.status
        }

        fn retry_after_header(&self) -> Option<&str> {
            self.retry_after.as_deref()
        }
    }

    #[test]
    fn test_is_rate_limit() {
        assert!(is_rate_limit(&TestError::with_status(429)));
        assert!(is_rate_limit(&TestError::msg("Rate limit reached for model")));
        assert!(is_rate_limit(&TestError::msg("rate_limit_exceeded")));
        assert!(is_rate_limit(&TestError::msg("HTTP 429")));
        assert!(is_rate_limit(&TestError::msg("Too Many Requests")));
        assert!(!is_rate_limit(&TestError::msg("404 Not Found")));
        assert!(!is_rate_limit(&TestError::with_status(503)));
    }

    #[test]
    fn test_is_transient() {
        for status in 500..=504 {
            assert!(is_transient(&TestError::with_status(status)), "{}", status);
        }
        assert!(!is_transient(&TestError::with_status(404)));
        assert!(is_transient(&TestError::msg("ECONNRESET")));
        assert!(is_transient(&TestError::msg("connect ECONNREFUSED 127.0.0.1")));
        assert!(is_transient(&TestError::msg("socket hang up")));
        assert!(is_transient(&TestError::msg("network error: dns failure")));
        assert!(is_transient(&TestError::msg("request timeout")));
        assert!(is_transient(&TestError::msg("upstream returned 502 Bad Gateway")));
        assert!(is_transient(&TestError::msg("too many requests")));
        assert!(!is_transient(&TestError::msg("invalid api key")));
        assert!(!is_transient(&TestError::msg("HTTP 404 fetching page")));
    }

    #[test]
    fn test_status_outranks_message_digits() {
        let mut not_found = TestError::with_status(404);
        not_found.message = "HTTP 404 fetching https://shop.test/cards/503".to_string();
        assert!(!is_transient(&not_found));

        let mut forbidden = TestError::with_status(403);
        forbidden.message = "HTTP 403 fetching https://network.example/429/timeout".to_string();
        assert!(!is_rate_limit(&forbidden));
        assert!(!is_transient(&forbidden));

        let mut overloaded = TestError::with_status(503);
        overloaded.message = "HTTP 503 fetching https://shop.test/".to_string();
        assert!(is_transient(&overloaded));
    }

    #[test]
    fn test_extract_retry_after() {
        let mut header = TestError::msg("slow down");
        header.retry_after = Some("30".to_string());
        assert_eq!(extract_retry_after(&header), Some(Duration::from_millis(30_000)));

        let hint = TestError::msg("Rate limit reached. Try again in 1.1 seconds.");
        assert_eq!(extract_retry_after(&hint), Some(Duration::from_millis(1100)));

        let short = TestError::msg("Please try again in 2.3456s");
        assert_eq!(extract_retry_after(&short), Some(Duration::from_millis(2346)));

        assert_eq!(extract_retry_after(&TestError::msg("unknown")), None);
    }

    #[test]
    fn test_header_takes_precedence_over_message() {
        let mut err = TestError::msg("try again in 9 seconds");
        err.retry_after = Some("2".to_string());
        assert_eq!(extract_retry_after(&err), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_seconds_to_millis() {
        assert_eq!(seconds_to_millis("0"), Some(0));
        assert_eq!(seconds_to_millis("1.1"), Some(1100));
        assert_eq!(seconds_to_millis("0.0001"), Some(1));
        assert_eq!(seconds_to_millis(".5"), Some(500));
        assert_eq!(seconds_to_millis("abc"), None);
        assert_eq!(seconds_to_millis(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<&str, TestError> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("ok")
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError::msg("ECONNRESET"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 10ms then 20ms
        assert_eq!(start.elapsed(), Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_original_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(10));

        let result: Result<(), TestError> = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::msg(&format!("network down #{}", n)))
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "network down #2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), TestError> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::with_status(404))
            })
            .await;

        assert_eq!(result.unwrap_err().status, Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_suggested_wait_wins_when_longer() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let policy = RetryPolicy::new(1, Duration::from_millis(10));

        let _ = policy
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    let mut err = TestError::with_status(429);
                    err.retry_after = Some("30".to_string());
                    Err(err)
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_capped_and_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let policy = RetryPolicy::new(4, Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300))
            .with_on_retry(move |attempt, delay, _err| {
                sink.lock().unwrap().push((attempt, delay));
            });

        let result: Result<(), TestError> = policy
            .run(|| async { Err(TestError::with_status(503)) })
            .await;
        assert!(result.is_err());

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200)),
                (3, Duration::from_millis(300)),
                (4, Duration::from_millis(300)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_multiplier_falls_back_to_max_delay() {
        for multiplier in [-1.0, f64::NAN, f64::INFINITY] {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            let policy = RetryPolicy::new(2, Duration::from_millis(100))
                .with_max_delay(Duration::from_millis(400))
                .with_multiplier(multiplier)
                .with_on_retry(move |_attempt, delay, _err| sink.lock().unwrap().push(delay));

            let result: Result<(), TestError> = policy
                .run(|| async { Err(TestError::with_status(502)) })
                .await;
            assert!(result.is_err());

            let seen = seen.lock().unwrap().clone();
            assert_eq!(
                seen,
                vec![Duration::from_millis(100), Duration::from_millis(400)],
                "multiplier {}",
                multiplier
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1))
            .with_should_retry(|e| e.status() == Some(404));

        let _: Result<(), TestError> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::with_status(404))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_profiles() {
        let site = RetryPolicy::external_site();
        assert_eq!(site.max_retries, 3);
        assert_eq!(site.initial_delay, Duration::from_millis(2000));
        assert_eq!(site.max_delay, Duration::from_millis(30_000));

        let api = RetryPolicy::generative_api();
        assert_eq!(api.max_attempts(), 6);
        assert_eq!(api.initial_delay, Duration::from_millis(5000));
        assert_eq!(api.max_delay, Duration::from_millis(120_000));
        assert!((api.should_retry)(&TestError::msg("rate limit exceeded")));
    }
}
