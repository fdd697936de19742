//! Single consumer loop.
//!
//! Exactly one processor instance runs per queue. That single consumer is
//! what guarantees at most one job is `Processing` at a time, keeps queue
//! positions meaningful, and bounds concurrent load on rate-limited
//! downstream APIs.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::QueueError;
use crate::executor::FallbackExecutor;
use crate::job::{Job, ResearchOutput};
use crate::notifier::Notifier;
use crate::provider::ProviderList;
use crate::queue::JobQueue;

/// Dequeues jobs one at a time and drives them to a terminal state.
pub struct JobProcessor {
    queue: Arc<JobQueue>,
    executor: FallbackExecutor,
    providers: ProviderList<ResearchOutput>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<JobQueue>,
        executor: FallbackExecutor,
        providers: ProviderList<ResearchOutput>,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            queue,
            executor,
            providers,
            notifier,
            config,
        }
    }

    /// Run the consumer loop until the queue shuts down.
    ///
    /// A failed job is recorded and reported, never auto-requeued. An error
    /// in the loop body itself (queue bookkeeping, not job processing) is
    /// logged and the loop retries after a short delay — it never
    /// terminates the consumer.
    pub async fn run(self: Arc<Self>) {
        info!("Job processor started");

        loop {
            let Some(job) = self.queue.dequeue().await else {
                info!("Job processor stopping: queue shut down");
                return;
            };

            if let Err(e) = self.process_one(job).await {
                error!(error = %e, "Consumer loop error, retrying shortly");
                tokio::time::sleep(self.config.consumer_retry_delay).await;
            }
        }
    }

    /// Process one dequeued job to a terminal state.
    async fn process_one(&self, job: Job) -> Result<(), QueueError> {
        let job_id = job.id;
        info!(
            job_id = %job_id,
            requester = %job.requester,
            "Processing job"
        );

        // Jobs that started immediately (entered at position 0) skip this
        // notification to reduce noise.
        if job.initial_position > 0 {
            self.notify("processing_started", self.notifier.notify_processing_started(&job).await);
        }

        let started = std::time::Instant::now();
        let outcome = self.executor.run(&self.providers, &job.payload).await;

        let finished = match outcome {
            Ok(output) => {
                info!(
                    job_id = %job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    topic = %output.topic,
                    "Job completed"
                );
                let finished = self.queue.complete(job_id, output).await?;
                self.notify("result", self.notifier.notify_result(&finished).await);
                finished
            }
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Job failed"
                );
                let finished = self.queue.fail(job_id, e.to_string()).await?;
                self.notify("error", self.notifier.notify_error(&finished).await);
                finished
            }
        };

        self.schedule_purge(finished.id);
        Ok(())
    }

    /// Drop the terminal job from tracking after the retention window, so
    /// late status polls keep working for a while.
    fn schedule_purge(&self, id: uuid::Uuid) {
        let queue = self.queue.clone();
        let retention = self.config.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            queue.purge(id).await;
        });
    }

    /// Notifier calls are fire-and-forget: log failures, never propagate.
    fn notify(&self, what: &str, result: Result<(), String>) {
        if let Err(e) = result {
            warn!(notification = what, error = %e, "Notifier delivery failed");
        }
    }
}
