//! Domain-validated job and batch mutations.
//!
//! Every transition method follows the same shape: fetch the current
//! record, ask the domain layer whether the move is legal, and only then
//! issue the conditional persistence write. Illegal transitions never
//! reach the repository.

use std::sync::Arc;

use relight_core::{
    validate_transition, BatchJob, CoreError, Job, JobStatus, NewBatchJob, NewJob,
};
use relight_db::{BatchProgressUpdate, JobRepository, JobStatusUpdate, RepoError};
use uuid::Uuid;

/// Bounded retries for the optimistic batch-progress write.
const MAX_INCREMENT_ATTEMPTS: u32 = 5;

/// Error type for service-level operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Composes the pure domain rules with the repository.
#[derive(Clone)]
pub struct JobService {
    repo: Arc<dyn JobRepository>,
}

impl JobService {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    // -- creation -----------------------------------------------------------

    /// Validate and persist a new queued job; registers it with its
    /// batch when one is referenced.
    pub async fn create_job(&self, input: NewJob) -> Result<Job, ServiceError> {
        let job = Job::new(input)?;
        self.repo.create_job(&job).await?;
        if let Some(batch_id) = job.batch_id {
            self.repo.append_batch_child(batch_id, job.job_id).await?;
        }
        tracing::info!(job_id = %job.job_id, user_id = %job.user_id, "Job created");
        Ok(job)
    }

    /// Validate and persist a new batch aggregate.
    pub async fn create_batch(&self, input: NewBatchJob) -> Result<BatchJob, ServiceError> {
        let batch = BatchJob::new(input)?;
        self.repo.create_batch(&batch).await?;
        tracing::info!(
            batch_id = %batch.batch_id,
            total_count = batch.total_count,
            "Batch created"
        );
        Ok(batch)
    }

    // -- lookups ------------------------------------------------------------

    pub async fn find_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        Ok(self.repo.find_job(job_id).await?)
    }

    pub async fn find_batch(&self, batch_id: Uuid) -> Result<BatchJob, ServiceError> {
        Ok(self.repo.find_batch(batch_id).await?)
    }

    /// Oldest queued jobs, up to `limit`.
    pub async fn find_queued(&self, limit: u32) -> Result<Vec<Job>, ServiceError> {
        Ok(self.repo.find_queued_jobs(limit).await?)
    }

    pub async fn find_jobs_in_batch(&self, batch_id: Uuid) -> Result<Vec<Job>, ServiceError> {
        Ok(self.repo.find_jobs_by_batch(batch_id).await?)
    }

    // -- transitions --------------------------------------------------------

    /// QUEUED → PROCESSING, recording the transient rendition key.
    ///
    /// Doubles as the dispatch claim: the conditional write means two
    /// workers racing on the same queued job cannot both win.
    pub async fn mark_processing(&self, job_id: Uuid, temp_key: &str) -> Result<Job, ServiceError> {
        self.transition(
            job_id,
            JobStatus::Processing,
            JobStatusUpdate {
                temp_key: Some(temp_key.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// PROCESSING → EDITING.
    pub async fn mark_editing(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.transition(job_id, JobStatus::Editing, JobStatusUpdate::default())
            .await
    }

    /// EDITING → COMPLETED, recording the final library key.
    pub async fn mark_completed(&self, job_id: Uuid, final_key: &str) -> Result<Job, ServiceError> {
        self.transition(
            job_id,
            JobStatus::Completed,
            JobStatusUpdate {
                final_key: Some(final_key.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Any non-terminal status → FAILED, recording the reason.
    pub async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<Job, ServiceError> {
        self.transition(
            job_id,
            JobStatus::Failed,
            JobStatusUpdate {
                error: Some(error.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Shared transition gate: read, validate in memory, then write
    /// conditioned on the status that was read.
    async fn transition(
        &self,
        job_id: Uuid,
        target: JobStatus,
        update: JobStatusUpdate,
    ) -> Result<Job, ServiceError> {
        let current = self.repo.find_job(job_id).await?;
        validate_transition(current.status, target)?;
        let updated = self
            .repo
            .update_job_status(job_id, current.status, target, update)
            .await?;
        tracing::debug!(
            job_id = %job_id,
            from = %current.status,
            to = %target,
            "Job transitioned"
        );
        Ok(updated)
    }

    // -- batch progress -----------------------------------------------------

    /// Count one terminal child against its batch.
    ///
    /// Optimistic read-validate-conditional-write loop: a conflicting
    /// sibling increment triggers a re-read and retry, so no increment is
    /// ever lost. Returns the batch state produced by *this* call's
    /// write — the caller that observes the completing transition is the
    /// one that fires the batch notification.
    pub async fn increment_batch_progress(&self, batch_id: Uuid) -> Result<BatchJob, ServiceError> {
        let mut attempt = 0;
        loop {
            let batch = self.repo.find_batch(batch_id).await?;
            let increment = batch.compute_increment()?;
            match self
                .repo
                .update_batch_progress(
                    batch_id,
                    batch.completed_count,
                    BatchProgressUpdate {
                        completed_count: increment.completed_count,
                        status: increment.status,
                    },
                )
                .await
            {
                Ok(updated) => return Ok(updated),
                Err(RepoError::Conflict(reason)) if attempt < MAX_INCREMENT_ATTEMPTS => {
                    attempt += 1;
                    tracing::debug!(
                        batch_id = %batch_id,
                        attempt,
                        reason,
                        "Batch increment conflicted, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
