//! Provider fallback execution.
//!
//! Runs one task against an ordered list of interchangeable providers.
//! Transient failures are retried on the same provider with backoff; a
//! malformed response fails over to the next provider; a fatal error aborts
//! the whole call. No retry loop is unbounded.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::{ExecutorError, ProviderError, ProviderFailure};
use crate::limiter::RateLimiter;
use crate::provider::Provider;

/// Executes a task against providers in fixed priority order.
pub struct FallbackExecutor {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl FallbackExecutor {
    /// Create an executor with the given rate limiter and retry policy.
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    /// Run `input` against the providers in order.
    ///
    /// Returns the first well-formed success. A provider that exhausts its
    /// attempt budget is never revisited after its successor is tried. If
    /// every provider is exhausted, the error carries one failure summary
    /// per provider in the order they were tried.
    pub async fn run<T>(
        &self,
        providers: &[Arc<dyn Provider<T>>],
        input: &str,
    ) -> Result<T, ExecutorError> {
        if providers.is_empty() {
            return Err(ExecutorError::NoProviders);
        }

        let mut failures: Vec<ProviderFailure> = Vec::with_capacity(providers.len());

        for provider in providers {
            match self.run_provider(provider.as_ref(), input).await? {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    tracing::warn!(
                        provider = %failure.provider,
                        attempts = failure.attempts,
                        class = failure.class,
                        "Provider exhausted, falling over"
                    );
                    failures.push(failure);
                }
            }
        }

        Err(ExecutorError::AllProvidersFailed { failures })
    }

    /// Drive one provider through its attempt budget.
    ///
    /// Outer `Err` aborts the whole call (fatal); inner `Err` is the
    /// failure summary recorded before falling over to the next provider.
    async fn run_provider<T>(
        &self,
        provider: &dyn Provider<T>,
        input: &str,
    ) -> Result<std::result::Result<T, ProviderFailure>, ExecutorError> {
        let name = provider.name().to_string();
        // A zero budget would skip the loop entirely; every provider gets
        // at least one attempt.
        let max_attempts = self.policy.max_attempts_per_provider.max(1);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 1..=max_attempts {
            self.limiter.wait(provider.operation()).await;

            let outcome = provider.invoke(input).await;
            match outcome {
                Ok(value) => {
                    tracing::debug!(
                        provider = %name,
                        attempt,
                        outcome = "success",
                        "Provider attempt"
                    );
                    return Ok(Ok(value));
                }
                Err(err) => {
                    tracing::debug!(
                        provider = %name,
                        attempt,
                        outcome = err.class(),
                        error = %err,
                        "Provider attempt"
                    );

                    match &err {
                        ProviderError::RateLimited { retry_after, .. } => {
                            if attempt < max_attempts {
                                let delay =
                                    retry_after.unwrap_or(self.policy.rate_limited_delay);
                                tokio::time::sleep(delay).await;
                            }
                            last_error = Some(err);
                        }
                        ProviderError::Transient { .. } => {
                            if attempt < max_attempts {
                                let delay = jitter(self.policy.transient_delay(attempt));
                                tokio::time::sleep(delay).await;
                            }
                            last_error = Some(err);
                        }
                        ProviderError::Malformed { .. } => {
                            // Same provider will keep producing garbage;
                            // fall over without burning remaining attempts.
                            return Ok(Err(ProviderFailure {
                                provider: name,
                                attempts: attempt,
                                class: err.class(),
                                message: err.to_string(),
                            }));
                        }
                        ProviderError::Fatal { .. } => {
                            tracing::error!(
                                provider = %name,
                                attempt,
                                error = %err,
                                "Fatal provider error, aborting call"
                            );
                            return Err(ExecutorError::Fatal(err));
                        }
                    }
                }
            }
        }

        let last = last_error.expect("attempt loop ran at least once");
        Ok(Err(ProviderFailure {
            provider: name,
            attempts: max_attempts,
            class: last.class(),
            message: last.to_string(),
        }))
    }
}

/// Apply ±12.5% jitter so synchronized retries don't stampede.
fn jitter(delay: Duration) -> Duration {
    let factor = 1.0 + (rand::random::<f64>() - 0.5) * 0.25;
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
