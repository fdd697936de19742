//! Provider abstraction for interchangeable backends.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;

/// An interchangeable backend capable of performing one class of work.
///
/// Implementations classify their own failures into [`ProviderError`]
/// variants at this boundary — the executor and everything above it branch
/// on the typed variant, never on error text.
#[async_trait]
pub trait Provider<T>: Send + Sync {
    /// Provider name, used in logs and failure summaries.
    fn name(&self) -> &str;

    /// Rate-limit operation class. Providers sharing a class share a
    /// minimum call interval; distinct classes never wait on each other.
    fn operation(&self) -> &str {
        "default"
    }

    /// Perform the work for one request.
    async fn invoke(&self, input: &str) -> Result<T, ProviderError>;
}

/// Ordered provider list, cheapest/fastest first.
///
/// The order is fixed per call for determinism — there is no shared
/// round-robin cursor, so concurrent requests cannot interfere with each
/// other's provider selection.
pub type ProviderList<T> = Vec<Arc<dyn Provider<T>>>;

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable providers for executor and processor tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// One scripted outcome for a [`ScriptedProvider`] attempt.
    #[derive(Clone)]
    pub enum Step {
        Ok(String),
        RateLimited(Option<std::time::Duration>),
        Transient(&'static str),
        Malformed(&'static str),
        Fatal(&'static str),
    }

    /// Provider that replays a fixed script of outcomes, one per attempt.
    /// Once the script runs out it keeps returning the last step.
    pub struct ScriptedProvider {
        name: String,
        operation: String,
        script: Mutex<Vec<Step>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        pub fn new(name: &str, script: Vec<Step>) -> Self {
            Self {
                name: name.to_string(),
                operation: format!("{name}-op"),
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider<String> for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn operation(&self) -> &str {
            &self.operation
        }

        async fn invoke(&self, _input: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let step = if script.len() > 1 {
                script.remove(0)
            } else {
                script
                    .first()
                    .cloned()
                    .unwrap_or(Step::Transient("script exhausted"))
            };

            match step {
                Step::Ok(value) => Ok(value),
                Step::RateLimited(retry_after) => Err(ProviderError::RateLimited {
                    provider: self.name.clone(),
                    retry_after,
                }),
                Step::Transient(reason) => Err(ProviderError::Transient {
                    provider: self.name.clone(),
                    reason: reason.to_string(),
                }),
                Step::Malformed(reason) => Err(ProviderError::Malformed {
                    provider: self.name.clone(),
                    reason: reason.to_string(),
                }),
                Step::Fatal(reason) => Err(ProviderError::Fatal {
                    provider: self.name.clone(),
                    reason: reason.to_string(),
                }),
            }
        }
    }
}
