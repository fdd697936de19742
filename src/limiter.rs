//! Per-operation rate limiting.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Cooperative minimum-interval throttle, keyed by operation name.
///
/// `wait` delays the caller until at least the configured interval has
/// elapsed since the operation's previous call. This smooths call rates to
/// downstream APIs — it delays, it never rejects. Unrelated operation names
/// never block each other.
pub struct RateLimiter {
    intervals: HashMap<String, Duration>,
    default_interval: Duration,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Create a limiter with per-operation intervals and a default for
    /// operations not explicitly configured.
    pub fn new(
        intervals: impl IntoIterator<Item = (String, Duration)>,
        default_interval: Duration,
    ) -> Self {
        Self {
            intervals: intervals.into_iter().collect(),
            default_interval,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Create a limiter that applies one interval to every operation.
    pub fn uniform(interval: Duration) -> Self {
        Self::new(std::iter::empty(), interval)
    }

    /// The configured minimum interval for an operation.
    pub fn interval_for(&self, operation: &str) -> Duration {
        self.intervals
            .get(operation)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Suspend until the operation's minimum interval has elapsed since its
    /// last call, then stamp "now" as the last-call time before returning.
    ///
    /// The lock is never held across the sleep; concurrent callers for the
    /// same operation re-check after waking so each one still observes the
    /// full interval.
    pub async fn wait(&self, operation: &str) {
        let interval = self.interval_for(operation);

        loop {
            let remaining = {
                let mut last_call = self.last_call.lock().await;
                let now = Instant::now();
                match last_call.get(operation) {
                    Some(last) => {
                        let elapsed = now.duration_since(*last);
                        if elapsed >= interval {
                            last_call.insert(operation.to_string(), now);
                            return;
                        }
                        interval - elapsed
                    }
                    None => {
                        last_call.insert(operation.to_string(), now);
                        return;
                    }
                }
            };

            tracing::trace!(
                operation = %operation,
                wait_ms = remaining.as_millis() as u64,
                "Rate limit wait"
            );
            tokio::time::sleep(remaining).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_enforce_interval() {
        let limiter = RateLimiter::uniform(Duration::from_secs(2));

        let start = Instant::now();
        limiter.wait("search").await;
        limiter.wait("search").await;
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_secs(2),
            "second call returned after {elapsed:?}, expected >= 2s"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_returns_immediately() {
        let limiter = RateLimiter::uniform(Duration::from_secs(10));

        let start = Instant::now();
        limiter.wait("search").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_operations_never_block_each_other() {
        let limiter = RateLimiter::uniform(Duration::from_secs(30));

        let start = Instant::now();
        limiter.wait("search").await;
        limiter.wait("reddit").await;
        limiter.wait("llm").await;

        // Three different operations, no shared state: no waiting at all.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn per_operation_intervals_override_default() {
        let limiter = RateLimiter::new(
            [("google".to_string(), Duration::from_secs(1))],
            Duration::from_secs(5),
        );

        assert_eq!(limiter.interval_for("google"), Duration::from_secs(1));
        assert_eq!(limiter.interval_for("unknown"), Duration::from_secs(5));

        let start = Instant::now();
        limiter.wait("google").await;
        limiter.wait("google").await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_measured_from_last_return() {
        let limiter = RateLimiter::uniform(Duration::from_secs(2));

        limiter.wait("op").await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        // More than the interval has already passed: no extra wait.
        let start = Instant::now();
        limiter.wait("op").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
