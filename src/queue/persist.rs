//! Snapshot persistence for tracked jobs.
//!
//! The queue writes a full snapshot of every tracked (non-purged) job after
//! each mutation — it is a keyed snapshot, not an append-only log. The
//! backing medium sits behind [`SnapshotStore`]; the default is a JSON file,
//! tests use the in-memory store.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PersistError;
use crate::job::Job;

/// Backend-agnostic snapshot storage.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot with the given set of jobs.
    async fn save(&self, jobs: &[Job]) -> Result<(), PersistError>;

    /// Load the last stored snapshot. An absent snapshot is an empty list.
    async fn load(&self) -> Result<Vec<Job>, PersistError>;
}

/// On-disk snapshot layout.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    jobs: Vec<Job>,
}

/// JSON-file snapshot store.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn save(&self, jobs: &[Job]) -> Result<(), PersistError> {
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            jobs: jobs.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write-then-rename so a crash mid-write never corrupts the snapshot.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Job>, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        Ok(snapshot.jobs)
    }
}

/// In-memory snapshot store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemorySnapshotStore {
    jobs: Mutex<Vec<Job>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, jobs: &[Job]) -> Result<(), PersistError> {
        *self.jobs.lock().await = jobs.to_vec();
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Job>, PersistError> {
        Ok(self.jobs.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[tokio::test]
    async fn json_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("queue_state.json"));

        let mut job = Job::new("user-1", "channel-1", "a query");
        job.transition_to(JobStatus::Processing).unwrap();

        store.save(&[job.clone()]).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, job.id);
        assert_eq!(loaded[0].status, JobStatus::Processing);
        assert_eq!(loaded[0].payload, "a query");
    }

    #[tokio::test]
    async fn json_store_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("nope.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("queue_state.json"));

        store
            .save(&[Job::new("a", "c", "q1"), Job::new("b", "c", "q2")])
            .await
            .unwrap();
        store.save(&[Job::new("a", "c", "q3")]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].payload, "q3");
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        store.save(&[Job::new("u", "c", "q")]).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }
}
