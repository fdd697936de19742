//! Job records and the job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue.
    Queued,
    /// Currently being processed by the consumer.
    Processing,
    /// Pipeline finished and a result was stored.
    Completed,
    /// Pipeline failed and the error was stored.
    Failed,
}

impl JobStatus {
    /// Check if this status allows transitioning to another status.
    ///
    /// Transitions only move forward: Queued → Processing → terminal.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Queued, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Normalized result of a research pipeline run.
///
/// Every pipeline implementation returns exactly this shape — normalization
/// happens at the pipeline boundary, before results reach the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    /// Main topic of the analysis.
    pub topic: String,
    /// The synthesized analysis with citations.
    pub summary: String,
    /// Tool names used during research.
    pub tools_used: Vec<String>,
    /// Source URLs the summary draws on.
    pub sources_used: Vec<String>,
    /// Links to any PDF documents found.
    pub pdf_links: Vec<String>,
}

/// One user query's full analysis request and lifecycle record.
///
/// Owned by the queue while `Queued`, by the processor while `Processing`,
/// and immutable once terminal. Persisted as a full snapshot keyed by id
/// after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID.
    pub id: Uuid,
    /// Requester identifier (user id on the chat platform).
    pub requester: String,
    /// Context reference for replies (channel / conversation id).
    pub context: String,
    /// The raw query text.
    pub payload: String,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Current status.
    pub status: JobStatus,
    /// 0-based rank among currently queued jobs (0 = next to run).
    pub position: usize,
    /// Position assigned at enqueue. Never recomputed; jobs that entered at
    /// 0 skip the "processing started" notification.
    pub initial_position: usize,
    /// Stored result, present once Completed.
    pub result: Option<ResearchOutput>,
    /// Stored error message, present once Failed.
    pub error: Option<String>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        requester: impl Into<String>,
        context: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester: requester.into(),
            context: context.into(),
            payload: payload.into(),
            submitted_at: Utc::now(),
            status: JobStatus::Queued,
            position: 0,
            initial_position: 0,
            result: None,
            error: None,
        }
    }

    /// Transition to a new status. Rejects backward or skipping transitions.
    pub fn transition_to(&mut self, target: JobStatus) -> Result<(), String> {
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "Cannot transition job {} from {} to {}",
                self.id, self.status, target
            ));
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_valid() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn status_transitions_never_backward() {
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        // Queued cannot skip straight to terminal
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn job_transition_rejects_invalid() {
        let mut job = Job::new("user-1", "channel-1", "what is surplus value?");
        assert_eq!(job.status, JobStatus::Queued);

        assert!(job.transition_to(JobStatus::Completed).is_err());
        job.transition_to(JobStatus::Processing).unwrap();
        job.transition_to(JobStatus::Completed).unwrap();
        assert!(job.transition_to(JobStatus::Failed).is_err());
    }

    #[test]
    fn job_serde_roundtrip() {
        let mut job = Job::new("user-1", "channel-1", "test query");
        job.result = Some(ResearchOutput {
            topic: "Test".into(),
            summary: "A summary".into(),
            tools_used: vec!["web_search".into()],
            sources_used: vec!["https://example.org".into()],
            pdf_links: vec![],
        });

        let json = serde_json::to_string(&job).unwrap();
        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.status, JobStatus::Queued);
        assert_eq!(parsed.result.unwrap().topic, "Test");
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
