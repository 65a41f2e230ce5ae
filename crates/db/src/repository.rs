//! The [`JobRepository`] trait — the persistence contract the service
//! layer is written against.
//!
//! Every mutating method is conditional: status writes carry the status
//! the caller read, batch-progress writes carry the counter value the
//! caller read. An implementation must reject the write with
//! [`RepoError::Conflict`](crate::RepoError::Conflict) when the persisted
//! record no longer matches, so interleaved mutations fail safely instead
//! of corrupting state.

use async_trait::async_trait;
use relight_core::{BatchJob, BatchStatus, Job, JobStatus};
use uuid::Uuid;

use crate::error::RepoError;

/// Field changes accompanying a job status transition.
///
/// `None` leaves the stored field untouched. `updated_at` is stamped by
/// the implementation.
#[derive(Debug, Clone, Default)]
pub struct JobStatusUpdate {
    pub temp_key: Option<String>,
    pub final_key: Option<String>,
    pub error: Option<String>,
}

/// New counter state for a batch-progress write.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgressUpdate {
    pub completed_count: u32,
    pub status: BatchStatus,
}

/// Persistence operations for jobs and batch aggregates.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job. Fails with `AlreadyExists` on id collision.
    async fn create_job(&self, job: &Job) -> Result<(), RepoError>;

    /// Fetch a job by id.
    async fn find_job(&self, job_id: Uuid) -> Result<Job, RepoError>;

    /// Conditionally move a job to `status`, applying `update`'s fields.
    ///
    /// The write only lands if the persisted status still equals
    /// `expected`; otherwise `Conflict`. Returns the updated job.
    async fn update_job_status(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        status: JobStatus,
        update: JobStatusUpdate,
    ) -> Result<Job, RepoError>;

    /// Oldest queued jobs, up to `limit`. Dispatcher feed.
    async fn find_queued_jobs(&self, limit: u32) -> Result<Vec<Job>, RepoError>;

    /// All jobs belonging to a batch.
    async fn find_jobs_by_batch(&self, batch_id: Uuid) -> Result<Vec<Job>, RepoError>;

    /// Insert a new batch. Fails with `AlreadyExists` on id collision.
    async fn create_batch(&self, batch: &BatchJob) -> Result<(), RepoError>;

    /// Fetch a batch by id.
    async fn find_batch(&self, batch_id: Uuid) -> Result<BatchJob, RepoError>;

    /// Conditionally advance a batch's progress counter.
    ///
    /// The write only lands if the persisted `completed_count` still
    /// equals `expected_completed`; otherwise `Conflict`. Two concurrent
    /// increments can therefore never both land on the same base value.
    /// Returns the updated batch.
    async fn update_batch_progress(
        &self,
        batch_id: Uuid,
        expected_completed: u32,
        update: BatchProgressUpdate,
    ) -> Result<BatchJob, RepoError>;

    /// Append a child job id to a batch. Append-only.
    async fn append_batch_child(
        &self,
        batch_id: Uuid,
        job_id: Uuid,
    ) -> Result<BatchJob, RepoError>;
}
