//! Research pipeline collaborator boundary.
//!
//! The actual pipeline (query optimization, search, scraping, ranking,
//! synthesis) lives outside this crate. It plugs in behind the
//! [`ResearchPipeline`] trait and is normalized to one fixed result shape,
//! [`crate::job::ResearchOutput`], before anything reaches the queue or the
//! executor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::job::ResearchOutput;
use crate::provider::Provider;

/// A backend capable of running the full research pipeline for one query.
///
/// Implementations classify their failures into [`ProviderError`] variants
/// here, at the boundary — a 429 becomes `RateLimited`, a connect timeout
/// becomes `Transient`, an unparseable model response becomes `Malformed`.
#[async_trait]
pub trait ResearchPipeline: Send + Sync {
    /// Backend name for logs and failure summaries.
    fn name(&self) -> &str;

    /// Rate-limit operation class for this backend.
    fn operation(&self) -> &str;

    /// Process one query end to end.
    async fn process(&self, query: &str) -> Result<ResearchOutput, ProviderError>;
}

/// Adapter presenting a [`ResearchPipeline`] as a
/// [`Provider<ResearchOutput>`] for the fallback executor.
pub struct PipelineProvider {
    inner: Arc<dyn ResearchPipeline>,
}

impl PipelineProvider {
    pub fn new(inner: Arc<dyn ResearchPipeline>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl Provider<ResearchOutput> for PipelineProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn operation(&self) -> &str {
        self.inner.operation()
    }

    async fn invoke(&self, input: &str) -> Result<ResearchOutput, ProviderError> {
        self.inner.process(input).await
    }
}

/// Validate a query before it is accepted into the queue.
///
/// Returns the reason for rejection, or `None` when the query is fine.
pub fn validate_query(query: &str, max_len: usize) -> Option<String> {
    if query.trim().is_empty() {
        return Some("query must not be empty".to_string());
    }
    if query.len() > max_len {
        return Some(format!(
            "query is {} characters, maximum is {max_len}",
            query.len()
        ));
    }
    None
}
