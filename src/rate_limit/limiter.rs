//! Minimum-interval limiter for one class of external resource.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Spaces out calls against one resource class (page fetches, image fetches).
///
/// `execute` waits until at least `min_interval` has passed since the previous
/// call *started*, then runs the operation. Separate instances share nothing;
/// clones of one instance share the same last-dispatch timestamp.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    name: &'static str,
    min_interval: Duration,
    last_dispatch: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter enforcing `min_interval` between call starts.
    pub fn new(name: &'static str, min_interval: Duration) -> Self {
        Self {
            name,
            min_interval,
            last_dispatch: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a limiter from a millisecond interval.
    pub fn from_millis(name: &'static str, min_interval_ms: u64) -> Self {
        Self::new(name, Duration::from_millis(min_interval_ms))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time remaining before the next call may start.
    pub async fn time_until_ready(&self) -> Duration {
        let last = self.last_dispatch.lock().await;
        Self::remaining(*last, self.min_interval)
    }

    fn remaining(last: Option<Instant>, min_interval: Duration) -> Duration {
        match last {
            Some(last) => min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait for this resource class to be ready and mark a dispatch.
    pub async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;
        let wait = Self::remaining(*last, self.min_interval);
        if wait > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", self.name, wait);
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
    }

    /// Run `op` once the minimum interval since the previous start has elapsed.
    pub async fn execute<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        op().await
    }
}
