//! Job records and the abstract job store.
//!
//! A job is one unit of streaming/transcoding work attributed to a user.
//! The streaming core creates jobs, accounts transferred bytes against
//! them and ends them; persistence beyond the in-memory store is an
//! external concern.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    AdaptiveStream,
    AudioStream,
    VideoStream,
    Download,
}

/// A unit of streaming work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub username: String,
    pub media_element_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Set exactly once, when the job is deliberately ended or reaped.
    pub end_time: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    /// Monotonically non-decreasing while the job is open.
    pub bytes_transferred: u64,
}

impl Job {
    /// Whether the job is still open.
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Persistence boundary for jobs.
pub trait JobStore: Send + Sync {
    fn create(&self, job_type: JobType, username: &str, media_element_id: Uuid) -> Result<Job>;

    fn get(&self, id: Uuid) -> Option<Job>;

    /// Add to the job's cumulative byte count and refresh its activity
    /// timestamp. No-op for unknown or ended jobs.
    fn add_bytes_transferred(&self, id: Uuid, bytes: u64);

    /// Refresh the job's last-activity timestamp.
    fn touch(&self, id: Uuid);

    /// Mark the job ended. The end timestamp is only written once;
    /// subsequent calls are no-ops.
    fn set_end_time(&self, id: Uuid);

    /// All jobs without an end timestamp.
    fn active(&self) -> Vec<Job>;
}

/// In-memory job store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<Uuid, Job>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, job_type: JobType, username: &str, media_element_id: Uuid) -> Result<Job> {
        if username.is_empty() {
            return Err(Error::JobCreationFailed("username is empty".to_string()));
        }

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            job_type,
            username: username.to_string(),
            media_element_id,
            start_time: now,
            end_time: None,
            last_activity: now,
            bytes_transferred: 0,
        };
        self.jobs.insert(job.id, job.clone());

        tracing::info!(
            job_id = %job.id,
            job_type = ?job_type,
            username = %username,
            "Created job"
        );
        Ok(job)
    }

    fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|j| j.value().clone())
    }

    fn add_bytes_transferred(&self, id: Uuid, bytes: u64) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            if job.is_active() {
                job.bytes_transferred += bytes;
                job.last_activity = Utc::now();
            }
        }
    }

    fn touch(&self, id: Uuid) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.last_activity = Utc::now();
        }
    }

    fn set_end_time(&self, id: Uuid) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            if job.end_time.is_none() {
                job.end_time = Some(Utc::now());
                tracing::info!(
                    job_id = %id,
                    bytes_transferred = job.bytes_transferred,
                    duration_secs = (Utc::now() - job.start_time).num_seconds(),
                    "Ended job"
                );
            }
        }
    }

    fn active(&self) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let store = MemoryJobStore::new();
        let media_id = Uuid::new_v4();
        let job = store
            .create(JobType::AdaptiveStream, "alice", media_id)
            .unwrap();

        assert_eq!(job.bytes_transferred, 0);
        assert!(job.is_active());

        let found = store.get(job.id).unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.media_element_id, media_id);
    }

    #[test]
    fn test_create_requires_username() {
        let store = MemoryJobStore::new();
        let result = store.create(JobType::Download, "", Uuid::new_v4());
        assert!(matches!(result, Err(Error::JobCreationFailed(_))));
    }

    #[test]
    fn test_bytes_accounting_is_monotone() {
        let store = MemoryJobStore::new();
        let job = store
            .create(JobType::AdaptiveStream, "alice", Uuid::new_v4())
            .unwrap();

        store.add_bytes_transferred(job.id, 1000);
        store.add_bytes_transferred(job.id, 500);
        assert_eq!(store.get(job.id).unwrap().bytes_transferred, 1500);

        // Unknown job IDs are ignored
        store.add_bytes_transferred(Uuid::new_v4(), 1000);
    }

    #[test]
    fn test_end_time_set_once() {
        let store = MemoryJobStore::new();
        let job = store
            .create(JobType::AdaptiveStream, "alice", Uuid::new_v4())
            .unwrap();

        store.set_end_time(job.id);
        let first = store.get(job.id).unwrap().end_time.unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        store.set_end_time(job.id);
        assert_eq!(store.get(job.id).unwrap().end_time.unwrap(), first);
    }

    #[test]
    fn test_ended_jobs_stop_accounting() {
        let store = MemoryJobStore::new();
        let job = store
            .create(JobType::AdaptiveStream, "alice", Uuid::new_v4())
            .unwrap();

        store.set_end_time(job.id);
        store.add_bytes_transferred(job.id, 1000);
        assert_eq!(store.get(job.id).unwrap().bytes_transferred, 0);
    }

    #[test]
    fn test_active_filters_ended() {
        let store = MemoryJobStore::new();
        let open = store
            .create(JobType::AdaptiveStream, "alice", Uuid::new_v4())
            .unwrap();
        let closed = store
            .create(JobType::Download, "bob", Uuid::new_v4())
            .unwrap();
        store.set_end_time(closed.id);

        let active = store.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, open.id);
    }
}
