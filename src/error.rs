//! Error types for Research Assist.

use std::time::Duration;

use uuid::Uuid;

/// Queue-related errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue is at capacity. User-visible: the caller is told to retry
    /// later, the request is never silently dropped.
    #[error("Queue is at maximum capacity ({capacity} jobs)")]
    CapacityExceeded { capacity: usize },

    #[error("Query rejected: {reason}")]
    InvalidQuery { reason: String },

    #[error("Queue is shutting down")]
    ShuttingDown,

    #[error("Job {id} not found")]
    JobNotFound { id: Uuid },

    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },
}

/// Provider failure classification.
///
/// Assigned exactly once, at the provider-adapter boundary. The executor
/// branches on the variant — call sites never re-derive the class by
/// inspecting error text.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider throttled us. Retried on the same provider after the
    /// declared delay (or the policy default when none is given).
    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// Network-level or timeout failure. Retried on the same provider with
    /// exponential backoff.
    #[error("Provider {provider} transient failure: {reason}")]
    Transient { provider: String, reason: String },

    /// The provider answered but the response was unparseable or incomplete.
    /// Not retried on that provider; the executor falls over to the next one.
    #[error("Provider {provider} returned malformed response: {reason}")]
    Malformed { provider: String, reason: String },

    /// Validation or programmer error. Aborts the whole call immediately;
    /// no other provider is tried.
    #[error("Fatal provider error from {provider}: {reason}")]
    Fatal { provider: String, reason: String },
}

impl ProviderError {
    /// The provider that produced this error.
    pub fn provider(&self) -> &str {
        match self {
            Self::RateLimited { provider, .. }
            | Self::Transient { provider, .. }
            | Self::Malformed { provider, .. }
            | Self::Fatal { provider, .. } => provider,
        }
    }

    /// Short label for logging.
    pub fn class(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Transient { .. } => "transient",
            Self::Malformed { .. } => "malformed",
            Self::Fatal { .. } => "fatal",
        }
    }
}

/// Final error recorded for one provider after it was given up on.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    /// Provider name.
    pub provider: String,
    /// Number of attempts made before giving up.
    pub attempts: u32,
    /// Classification label of the last error.
    pub class: &'static str,
    /// Last error message.
    pub message: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} attempt{}, {}): {}",
            self.provider,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" },
            self.class,
            self.message
        )
    }
}

/// Fallback-executor errors.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Every provider in the list was exhausted. Carries one failure summary
    /// per provider, in the order they were tried.
    #[error("All {} providers failed: {}", .failures.len(), format_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },

    /// A provider reported an unrecoverable error; remaining providers were
    /// not tried.
    #[error("Aborted on fatal error: {0}")]
    Fatal(ProviderError),

    #[error("No providers configured")]
    NoProviders,
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Persistence errors. Snapshot write failures are logged and tolerated —
/// in-memory state stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
