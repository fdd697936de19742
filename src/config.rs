//! Configuration types.

use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum number of jobs waiting in the queue.
    pub queue_capacity: usize,
    /// How long terminal jobs are kept for late status polling before purge.
    pub retention: Duration,
    /// Delay before the consumer loop retries after an internal error.
    pub consumer_retry_delay: Duration,
    /// Maximum query length accepted at enqueue.
    pub max_query_len: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            retention: Duration::from_secs(300), // 5 minutes
            consumer_retry_delay: Duration::from_secs(5),
            max_query_len: 500,
        }
    }
}

impl ServiceConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: env_parse("RESEARCH_QUEUE_CAPACITY", defaults.queue_capacity),
            retention: Duration::from_secs(env_parse(
                "RESEARCH_RETENTION_SECS",
                defaults.retention.as_secs(),
            )),
            consumer_retry_delay: defaults.consumer_retry_delay,
            max_query_len: env_parse("RESEARCH_MAX_QUERY_LEN", defaults.max_query_len),
        }
    }
}

/// Retry and backoff policy applied uniformly to every provider.
///
/// One explicit policy for all provider classes — attempt counts and delays
/// are never decided ad hoc at call sites.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed on a single provider before falling over.
    pub max_attempts_per_provider: u32,
    /// Base delay for exponential backoff on transient errors.
    pub backoff_base: Duration,
    /// Upper bound on any single backoff delay.
    pub backoff_cap: Duration,
    /// Delay used for rate-limited responses that don't declare their own.
    pub rate_limited_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_provider: 3,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            rate_limited_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff delay for the given 1-based attempt number,
    /// capped at `backoff_cap`. Jitter is applied by the executor.
    pub fn transient_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
