//! Notification seam toward the chat platform.
//!
//! The presentation layer (Discord, Slack, CLI, ...) implements [`Notifier`];
//! the processor invokes it at defined state-machine transitions, at most
//! once per transition. Calls are fire-and-forget: implementations report
//! delivery problems through their return value, the processor logs them and
//! moves on — a broken notifier never affects job processing.

use std::time::Duration;

use async_trait::async_trait;

use crate::job::Job;

/// Receives job lifecycle notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The job was accepted into the queue.
    ///
    /// Implementations typically skip the message for position 0 — the job
    /// starts immediately and a "queued" notice would only add noise.
    async fn notify_queued(&self, job: &Job) -> Result<(), String>;

    /// The job left the queue and processing began.
    async fn notify_processing_started(&self, job: &Job) -> Result<(), String>;

    /// Processing finished and `job.result` is set.
    async fn notify_result(&self, job: &Job) -> Result<(), String>;

    /// Processing failed and `job.error` is set.
    async fn notify_error(&self, job: &Job) -> Result<(), String>;
}

/// Rough wait estimate for a queue position, for user-facing messages.
///
/// Assumes the historical average of ~45 seconds of pipeline work per job.
pub fn estimate_wait(position: usize) -> String {
    const AVG_SECS_PER_JOB: u64 = 45;
    let secs = position as u64 * AVG_SECS_PER_JOB;
    let d = Duration::from_secs(secs);

    if d.as_secs() < 60 {
        format!("~{}s", d.as_secs())
    } else if d.as_secs() < 3600 {
        format!("~{}m", d.as_secs() / 60)
    } else {
        let hours = d.as_secs() / 3600;
        let minutes = (d.as_secs() % 3600) / 60;
        if minutes > 0 {
            format!("~{hours}h {minutes}m")
        } else {
            format!("~{hours}h")
        }
    }
}

/// Notifier that only logs. Default when no chat platform is wired in.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_queued(&self, job: &Job) -> Result<(), String> {
        if job.position > 0 {
            tracing::info!(
                job_id = %job.id,
                position = job.position,
                wait = %estimate_wait(job.position),
                "Job queued"
            );
        }
        Ok(())
    }

    async fn notify_processing_started(&self, job: &Job) -> Result<(), String> {
        tracing::info!(job_id = %job.id, "Processing started");
        Ok(())
    }

    async fn notify_result(&self, job: &Job) -> Result<(), String> {
        let topic = job
            .result
            .as_ref()
            .map(|r| r.topic.as_str())
            .unwrap_or("(none)");
        tracing::info!(job_id = %job.id, topic = %topic, "Job completed");
        Ok(())
    }

    async fn notify_error(&self, job: &Job) -> Result<(), String> {
        tracing::warn!(
            job_id = %job.id,
            error = %job.error.as_deref().unwrap_or("(unknown)"),
            "Job failed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_estimate_buckets() {
        assert_eq!(estimate_wait(0), "~0s");
        assert_eq!(estimate_wait(1), "~45s");
        assert_eq!(estimate_wait(3), "~2m");
        assert_eq!(estimate_wait(80), "~1h");
        assert_eq!(estimate_wait(84), "~1h 3m");
    }
}
