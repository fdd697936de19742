//! Service façade wiring the queue, processor, and collaborators together.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::config::{RetryPolicy, ServiceConfig};
use crate::error::QueueError;
use crate::executor::FallbackExecutor;
use crate::job::{Job, ResearchOutput};
use crate::limiter::RateLimiter;
use crate::notifier::Notifier;
use crate::pipeline::{self, PipelineProvider, ResearchPipeline};
use crate::processor::JobProcessor;
use crate::provider::ProviderList;
use crate::queue::persist::SnapshotStore;
use crate::queue::{JobQueue, QueueStatus};

/// The front door for enqueueing queries and polling their status.
///
/// Owns the queue and the single consumer task. Front-end collaborators
/// (chat handler, CLI) hold an `Arc<ResearchService>` and call the
/// non-blocking methods concurrently.
pub struct ResearchService {
    queue: Arc<JobQueue>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl ResearchService {
    /// Recover persisted state, spawn the consumer, and return the service.
    ///
    /// `pipelines` is the ordered backend list, cheapest/fastest first.
    pub async fn start(
        config: ServiceConfig,
        policy: RetryPolicy,
        limiter: Arc<RateLimiter>,
        pipelines: Vec<Arc<dyn ResearchPipeline>>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn SnapshotStore>,
    ) -> Arc<Self> {
        let queue = JobQueue::new(config.queue_capacity, store);
        let (restored, demoted) = queue.recover().await;
        if restored > 0 {
            info!(restored, demoted, "Resuming with recovered jobs");
        }

        let providers: ProviderList<ResearchOutput> = pipelines
            .into_iter()
            .map(|p| PipelineProvider::new(p) as _)
            .collect();

        let processor = Arc::new(JobProcessor::new(
            queue.clone(),
            FallbackExecutor::new(limiter, policy),
            providers,
            notifier.clone(),
            config.clone(),
        ));
        let handle = tokio::spawn(processor.run());

        Arc::new(Self {
            queue,
            notifier,
            config,
            consumer: Mutex::new(Some(handle)),
        })
    }

    /// Validate and enqueue a query. Returns the accepted job, already
    /// positioned; the queued notification has been dispatched.
    pub async fn enqueue(
        &self,
        requester: impl Into<String>,
        context: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<Job, QueueError> {
        let query = query.into();
        if let Some(reason) = pipeline::validate_query(&query, self.config.max_query_len) {
            return Err(QueueError::InvalidQuery { reason });
        }

        let job = self.queue.enqueue(requester, context, query).await?;

        if let Err(e) = self.notifier.notify_queued(&job).await {
            tracing::warn!(job_id = %job.id, error = %e, "Queued notification failed");
        }
        Ok(job)
    }

    /// Current queue status.
    pub async fn status_snapshot(&self) -> QueueStatus {
        self.queue.status_snapshot().await
    }

    /// Minimum queue position among a requester's pending jobs.
    pub async fn position_of(&self, requester: &str) -> Option<usize> {
        self.queue.position_of(requester).await
    }

    /// Look up a tracked job for late status polling.
    pub async fn job_status(&self, id: Uuid) -> Option<Job> {
        self.queue.job_status(id).await
    }

    /// Drain and stop.
    ///
    /// New enqueues are rejected immediately; the consumer finishes the
    /// in-flight job and everything already queued before it exits.
    pub async fn shutdown(&self) {
        info!("Shutting down research service");
        self.queue.begin_shutdown().await;

        let handle = self.consumer.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Consumer task ended abnormally");
            }
        }
        info!("Research service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::notifier::LogNotifier;
    use crate::queue::persist::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoPipeline;

    #[async_trait]
    impl ResearchPipeline for EchoPipeline {
        fn name(&self) -> &str {
            "echo"
        }
        fn operation(&self) -> &str {
            "echo"
        }
        async fn process(&self, query: &str) -> Result<ResearchOutput, ProviderError> {
            Ok(ResearchOutput {
                topic: query.to_string(),
                summary: format!("Echo: {query}"),
                tools_used: vec![],
                sources_used: vec![],
                pdf_links: vec![],
            })
        }
    }

    async fn service() -> Arc<ResearchService> {
        ResearchService::start(
            ServiceConfig::default(),
            RetryPolicy::default(),
            Arc::new(RateLimiter::uniform(Duration::ZERO)),
            vec![Arc::new(EchoPipeline)],
            Arc::new(LogNotifier),
            Arc::new(MemorySnapshotStore::new()),
        )
        .await
    }

    #[tokio::test]
    async fn rejects_invalid_queries_before_queueing() {
        let service = service().await;

        let err = service.enqueue("u", "c", "   ").await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidQuery { .. }));

        let err = service
            .enqueue("u", "c", "x".repeat(501))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidQuery { .. }));

        assert_eq!(service.status_snapshot().await.tracked_jobs, 0);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn enqueue_then_poll_until_completed() {
        let service = service().await;

        let job = service.enqueue("alice", "chan", "hello").await.unwrap();

        let mut finished = None;
        for _ in 0..100 {
            if let Some(j) = service.job_status(job.id).await {
                if j.status.is_terminal() {
                    finished = Some(j);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let finished = finished.expect("job should complete");
        assert_eq!(finished.result.unwrap().summary, "Echo: hello");
        service.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_stops_consumer() {
        let service = service().await;
        service.shutdown().await;
        service.shutdown().await;

        let err = service.enqueue("u", "c", "query").await.unwrap_err();
        assert!(matches!(err, QueueError::ShuttingDown));
    }
}
