//! Single-consumer job queue with positions and durable snapshots.

pub mod persist;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::{Job, JobStatus, ResearchOutput};
use persist::SnapshotStore;

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    /// Number of jobs waiting.
    pub depth: usize,
    /// Whether a job is currently being processed.
    pub is_processing: bool,
    /// Id of the job being processed, if any.
    pub current_job_id: Option<Uuid>,
    /// Maximum queue depth.
    pub capacity: usize,
    /// All tracked jobs, including terminal ones awaiting purge.
    pub tracked_jobs: usize,
}

struct QueueInner {
    /// FIFO of queued job ids.
    pending: VecDeque<Uuid>,
    /// Every tracked job by id, including terminal jobs inside the
    /// retention window.
    jobs: HashMap<Uuid, Job>,
    /// Job currently being processed.
    current: Option<Uuid>,
    shutting_down: bool,
}

/// Bounded FIFO of analysis requests.
///
/// Producers call `enqueue` / `status_snapshot` / `position_of` concurrently;
/// exactly one consumer calls `dequeue`, which is what keeps "position"
/// meaningful and bounds load on rate-limited downstream APIs. All
/// read-modify-write of the pending set happens under one mutex, and every
/// mutation is followed by a full-snapshot persist.
pub struct JobQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
    notify: Notify,
    store: Arc<dyn SnapshotStore>,
}

impl JobQueue {
    /// Create an empty queue backed by the given snapshot store.
    pub fn new(capacity: usize, store: Arc<dyn SnapshotStore>) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                jobs: HashMap::new(),
                current: None,
                shutting_down: false,
            }),
            notify: Notify::new(),
            store,
        })
    }

    /// Load the persisted snapshot and rebuild queue state.
    ///
    /// Jobs persisted as `Processing` lost their consumer when the process
    /// died, so they are demoted back to `Queued`. The pending set is
    /// rebuilt in original submission order. Returns (restored, demoted).
    pub async fn recover(&self) -> (usize, usize) {
        let loaded = match self.store.load().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Failed to load queue snapshot, starting empty");
                return (0, 0);
            }
        };

        let mut inner = self.inner.lock().await;
        let mut demoted = 0;

        for mut job in loaded {
            if job.status == JobStatus::Processing {
                // The transition table forbids Processing → Queued; recovery
                // is the one place the status moves back.
                job.status = JobStatus::Queued;
                demoted += 1;
            }
            inner.jobs.insert(job.id, job);
        }

        let mut queued: Vec<(chrono::DateTime<chrono::Utc>, Uuid)> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .map(|j| (j.submitted_at, j.id))
            .collect();
        queued.sort();
        inner.pending = queued.into_iter().map(|(_, id)| id).collect();

        Self::recompute_positions_locked(&mut inner);
        let restored = inner.jobs.len();
        self.persist_locked(&inner).await;

        if restored > 0 {
            info!(restored, demoted, "Recovered queue state from snapshot");
            self.notify.notify_one();
        }
        (restored, demoted)
    }

    /// Enqueue a new job.
    ///
    /// Fails with `CapacityExceeded` when the queue is full — the caller is
    /// told, the request is never silently dropped.
    pub async fn enqueue(
        &self,
        requester: impl Into<String>,
        context: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<Job, QueueError> {
        let mut inner = self.inner.lock().await;

        if inner.shutting_down {
            return Err(QueueError::ShuttingDown);
        }
        if inner.pending.len() >= self.capacity {
            warn!(capacity = self.capacity, "Queue full, rejecting enqueue");
            return Err(QueueError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let mut job = Job::new(requester, context, payload);
        job.position = inner.pending.len();
        job.initial_position = job.position;

        info!(
            job_id = %job.id,
            requester = %job.requester,
            position = job.position,
            "Job enqueued"
        );

        inner.pending.push_back(job.id);
        inner.jobs.insert(job.id, job.clone());
        self.persist_locked(&inner).await;
        drop(inner);

        self.notify.notify_one();
        Ok(job)
    }

    /// Remove and return the next job, suspending until one is available.
    ///
    /// The returned job has been marked `Processing` and remaining positions
    /// have been recomputed. Returns `None` once the queue is shutting down
    /// and a shutdown can only interrupt this wait — never mid-processing.
    pub async fn dequeue(&self) -> Option<Job> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register for wakeups before checking state, so an enqueue
            // between the check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                if let Some(id) = inner.pending.pop_front() {
                    let Some(job) = inner.jobs.get_mut(&id) else {
                        warn!(job_id = %id, "Pending id with no tracked job, skipping");
                        continue;
                    };
                    job.status = JobStatus::Processing;
                    let job = job.clone();
                    inner.current = Some(id);
                    Self::recompute_positions_locked(&mut inner);
                    self.persist_locked(&inner).await;
                    return Some(job);
                }
                if inner.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Record a successful result for the job being processed.
    pub async fn complete(&self, id: Uuid, result: ResearchOutput) -> Result<Job, QueueError> {
        self.finish(id, JobStatus::Completed, Some(result), None)
            .await
    }

    /// Record a failure for the job being processed.
    pub async fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<Job, QueueError> {
        self.finish(id, JobStatus::Failed, None, Some(error.into()))
            .await
    }

    async fn finish(
        &self,
        id: Uuid,
        target: JobStatus,
        result: Option<ResearchOutput>,
        error: Option<String>,
    ) -> Result<Job, QueueError> {
        let mut inner = self.inner.lock().await;

        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(QueueError::JobNotFound { id })?;
        let state = job.status.to_string();
        job.transition_to(target)
            .map_err(|_| QueueError::InvalidTransition {
                id,
                state,
                target: target.to_string(),
            })?;
        job.result = result;
        job.error = error;
        let finished = job.clone();

        if inner.current == Some(id) {
            inner.current = None;
        }
        Self::recompute_positions_locked(&mut inner);
        self.persist_locked(&inner).await;
        Ok(finished)
    }

    /// Drop a terminal job from tracking after its retention window.
    pub async fn purge(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        let purgeable = inner
            .jobs
            .get(&id)
            .is_some_and(|j| j.status.is_terminal());
        if !purgeable {
            return false;
        }
        inner.jobs.remove(&id);
        self.persist_locked(&inner).await;
        tracing::debug!(job_id = %id, "Purged terminal job");
        true
    }

    /// Reassign contiguous 0-based ranks to all queued jobs.
    ///
    /// Atomic with respect to concurrent enqueue (same mutex), and
    /// idempotent: applying it twice yields identical positions.
    pub async fn recompute_positions(&self) {
        let mut inner = self.inner.lock().await;
        Self::recompute_positions_locked(&mut inner);
        self.persist_locked(&inner).await;
    }

    fn recompute_positions_locked(inner: &mut QueueInner) {
        let ids: Vec<Uuid> = inner.pending.iter().copied().collect();
        for (rank, id) in ids.iter().enumerate() {
            if let Some(job) = inner.jobs.get_mut(id) {
                job.position = rank;
            }
        }
    }

    /// Current queue status.
    pub async fn status_snapshot(&self) -> QueueStatus {
        let inner = self.inner.lock().await;
        QueueStatus {
            depth: inner.pending.len(),
            is_processing: inner.current.is_some(),
            current_job_id: inner.current,
            capacity: self.capacity,
            tracked_jobs: inner.jobs.len(),
        }
    }

    /// Minimum position among a requester's queued jobs.
    pub async fn position_of(&self, requester: &str) -> Option<usize> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued && j.requester == requester)
            .map(|j| j.position)
            .min()
    }

    /// Look up a tracked job by id (queued, processing, or terminal within
    /// the retention window).
    pub async fn job_status(&self, id: Uuid) -> Option<Job> {
        self.inner.lock().await.jobs.get(&id).cloned()
    }

    /// Flag the queue as shutting down and wake any waiting consumer.
    ///
    /// New enqueues are rejected from here on, but `dequeue` keeps handing
    /// out already-pending jobs until the queue is empty — shutdown drains,
    /// it does not abandon. Only a hard process termination leaves jobs
    /// behind for recovery on next startup.
    pub async fn begin_shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.shutting_down = true;
        self.persist_locked(&inner).await;
        drop(inner);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Persist the current snapshot. Failures are logged and tolerated —
    /// in-memory state stays authoritative.
    async fn persist_locked(&self, inner: &QueueInner) {
        let jobs: Vec<Job> = inner.jobs.values().cloned().collect();
        if let Err(e) = self.store.save(&jobs).await {
            warn!(error = %e, "Failed to persist queue snapshot");
        }
    }
}
