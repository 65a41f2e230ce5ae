//! In-memory [`JobRepository`] implementation.
//!
//! Backs unit tests and credential-less local runs. All reads and
//! conditional writes for one call happen under a single mutex
//! acquisition, so the same lost-update guarantees hold as for the
//! durable store: two concurrent writers conditioned on the same base
//! value cannot both land.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use relight_core::{BatchJob, Job, JobStatus};
use uuid::Uuid;

use crate::error::RepoError;
use crate::repository::{BatchProgressUpdate, JobRepository, JobStatusUpdate};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    batches: HashMap<Uuid, BatchJob>,
}

/// Mutex-guarded map store.
#[derive(Default)]
pub struct MemoryJobRepository {
    inner: Mutex<Inner>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stamp a strictly-increasing `updated_at`.
///
/// Wall-clock reads can tie at microsecond resolution; the invariant is
/// that `updated_at` strictly increases across successful writes.
fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[async_trait::async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create_job(&self, job: &Job) -> Result<(), RepoError> {
        let mut inner = self.inner.lock();
        if inner.jobs.contains_key(&job.job_id) {
            return Err(RepoError::AlreadyExists {
                entity: "job",
                id: job.job_id,
            });
        }
        inner.jobs.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn find_job(&self, job_id: Uuid) -> Result<Job, RepoError> {
        self.inner
            .lock()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(RepoError::NotFound {
                entity: "job",
                id: job_id,
            })
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        status: JobStatus,
        update: JobStatusUpdate,
    ) -> Result<Job, RepoError> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get_mut(&job_id).ok_or(RepoError::NotFound {
            entity: "job",
            id: job_id,
        })?;
        if job.status != expected {
            return Err(RepoError::Conflict(format!(
                "job {job_id} is {}, expected {expected}",
                job.status
            )));
        }
        job.status = status;
        if update.temp_key.is_some() {
            job.temp_key = update.temp_key;
        }
        if update.final_key.is_some() {
            job.final_key = update.final_key;
        }
        if update.error.is_some() {
            job.error = update.error;
        }
        job.updated_at = next_updated_at(job.updated_at);
        Ok(job.clone())
    }

    async fn find_queued_jobs(&self, limit: u32) -> Result<Vec<Job>, RepoError> {
        let inner = self.inner.lock();
        let mut queued: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|j| j.created_at);
        queued.truncate(limit as usize);
        Ok(queued)
    }

    async fn find_jobs_by_batch(&self, batch_id: Uuid) -> Result<Vec<Job>, RepoError> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.batch_id == Some(batch_id))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn create_batch(&self, batch: &BatchJob) -> Result<(), RepoError> {
        let mut inner = self.inner.lock();
        if inner.batches.contains_key(&batch.batch_id) {
            return Err(RepoError::AlreadyExists {
                entity: "batch",
                id: batch.batch_id,
            });
        }
        inner.batches.insert(batch.batch_id, batch.clone());
        Ok(())
    }

    async fn find_batch(&self, batch_id: Uuid) -> Result<BatchJob, RepoError> {
        self.inner
            .lock()
            .batches
            .get(&batch_id)
            .cloned()
            .ok_or(RepoError::NotFound {
                entity: "batch",
                id: batch_id,
            })
    }

    async fn update_batch_progress(
        &self,
        batch_id: Uuid,
        expected_completed: u32,
        update: BatchProgressUpdate,
    ) -> Result<BatchJob, RepoError> {
        let mut inner = self.inner.lock();
        let batch = inner.batches.get_mut(&batch_id).ok_or(RepoError::NotFound {
            entity: "batch",
            id: batch_id,
        })?;
        if batch.completed_count != expected_completed {
            return Err(RepoError::Conflict(format!(
                "batch {batch_id} completed_count is {}, expected {expected_completed}",
                batch.completed_count
            )));
        }
        batch.completed_count = update.completed_count;
        batch.status = update.status;
        batch.updated_at = next_updated_at(batch.updated_at);
        Ok(batch.clone())
    }

    async fn append_batch_child(
        &self,
        batch_id: Uuid,
        job_id: Uuid,
    ) -> Result<BatchJob, RepoError> {
        let mut inner = self.inner.lock();
        let batch = inner.batches.get_mut(&batch_id).ok_or(RepoError::NotFound {
            entity: "batch",
            id: batch_id,
        })?;
        batch.child_job_ids.push(job_id);
        batch.updated_at = next_updated_at(batch.updated_at);
        Ok(batch.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
