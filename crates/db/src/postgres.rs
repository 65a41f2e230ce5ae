//! Postgres [`JobRepository`] implementation.
//!
//! Conditional writes are expressed directly in SQL: the `WHERE` clause
//! carries the status (or counter) the caller read, and an empty
//! `RETURNING` set is disambiguated into `NotFound` vs `Conflict` with a
//! follow-up existence probe.

use chrono::{DateTime, Utc};
use relight_core::{BatchJob, BatchStatus, Job, JobStatus};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::RepoError;
use crate::repository::{BatchProgressUpdate, JobRepository, JobStatusUpdate};
use crate::DbPool;

/// Column list for `jobs` queries.
const JOB_COLUMNS: &str = "\
    job_id, user_id, file_name, status, prompt, locale, \
    temp_key, final_key, error_message, batch_id, \
    created_at, updated_at, expires_at";

/// Column list for `batch_jobs` queries.
const BATCH_COLUMNS: &str = "\
    batch_id, user_id, status, shared_prompt, individual_prompts, \
    child_job_ids, completed_count, total_count, \
    created_at, updated_at, expires_at";

/// Postgres unique-violation error code.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Repository over a shared connection pool.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: DbPool,
}

impl PgJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct JobRow {
    job_id: Uuid,
    user_id: String,
    file_name: String,
    status: String,
    prompt: Option<String>,
    locale: String,
    temp_key: Option<String>,
    final_key: Option<String>,
    error_message: Option<String>,
    batch_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = RepoError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&row.status)
            .map_err(|e| RepoError::Storage(format!("job {}: {e}", row.job_id)))?;
        Ok(Job {
            job_id: row.job_id,
            user_id: row.user_id,
            file_name: row.file_name,
            status,
            prompt: row.prompt,
            locale: row.locale,
            temp_key: row.temp_key,
            final_key: row.final_key,
            error: row.error_message,
            batch_id: row.batch_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    batch_id: Uuid,
    user_id: String,
    status: String,
    shared_prompt: Option<String>,
    individual_prompts: Option<serde_json::Value>,
    child_job_ids: Vec<Uuid>,
    completed_count: i32,
    total_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for BatchJob {
    type Error = RepoError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::parse(&row.status)
            .map_err(|e| RepoError::Storage(format!("batch {}: {e}", row.batch_id)))?;
        let individual_prompts = row
            .individual_prompts
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                RepoError::Storage(format!("batch {}: bad individual_prompts: {e}", row.batch_id))
            })?;
        Ok(BatchJob {
            batch_id: row.batch_id,
            user_id: row.user_id,
            status,
            shared_prompt: row.shared_prompt,
            individual_prompts,
            child_job_ids: row.child_job_ids,
            completed_count: row.completed_count as u32,
            total_count: row.total_count as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
        })
    }
}

/// Map an insert error, treating a unique violation as `AlreadyExists`.
fn classify_insert_error(err: sqlx::Error, entity: &'static str, id: Uuid) -> RepoError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
            return RepoError::AlreadyExists { entity, id };
        }
    }
    RepoError::storage(err)
}

// ---------------------------------------------------------------------------
// JobRepository impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl JobRepository for PgJobRepository {
    async fn create_job(&self, job: &Job) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO jobs \
                 (job_id, user_id, file_name, status, prompt, locale, batch_id, \
                  created_at, updated_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(job.job_id)
        .bind(&job.user_id)
        .bind(&job.file_name)
        .bind(job.status.as_str())
        .bind(&job.prompt)
        .bind(&job.locale)
        .bind(job.batch_id)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify_insert_error(e, "job", job.job_id))?;
        Ok(())
    }

    async fn find_job(&self, job_id: Uuid) -> Result<Job, RepoError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::storage)?
            .ok_or(RepoError::NotFound {
                entity: "job",
                id: job_id,
            })?
            .try_into()
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        status: JobStatus,
        update: JobStatusUpdate,
    ) -> Result<Job, RepoError> {
        // GREATEST keeps updated_at strictly increasing even when two
        // commits land in the same microsecond.
        let query = format!(
            "UPDATE jobs \
             SET status = $3, \
                 temp_key = COALESCE($4, temp_key), \
                 final_key = COALESCE($5, final_key), \
                 error_message = COALESCE($6, error_message), \
                 updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond') \
             WHERE job_id = $1 AND status = $2 \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .bind(expected.as_str())
            .bind(status.as_str())
            .bind(&update.temp_key)
            .bind(&update.final_key)
            .bind(&update.error)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::storage)?;

        match row {
            Some(row) => row.try_into(),
            // Nothing matched: either the job is gone or its status moved
            // under us. Probe to tell the two apart.
            None => {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM jobs WHERE job_id = $1")
                        .bind(job_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(RepoError::storage)?;
                match current {
                    Some(current) => {
                        tracing::debug!(
                            job_id = %job_id,
                            current = %current,
                            expected = %expected,
                            "Conditional status write lost"
                        );
                        Err(RepoError::Conflict(format!(
                            "job {job_id} is {current}, expected {expected}"
                        )))
                    }
                    None => Err(RepoError::NotFound {
                        entity: "job",
                        id: job_id,
                    }),
                }
            }
        }
    }

    async fn find_queued_jobs(&self, limit: u32) -> Result<Vec<Job>, RepoError> {
        let query = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE status = $1 \
             ORDER BY created_at ASC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Queued.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(RepoError::storage)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_jobs_by_batch(&self, batch_id: Uuid) -> Result<Vec<Job>, RepoError> {
        let query = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE batch_id = $1 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await
            .map_err(RepoError::storage)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_batch(&self, batch: &BatchJob) -> Result<(), RepoError> {
        let individual_prompts = batch
            .individual_prompts
            .as_ref()
            .map(|p| serde_json::to_value(p).unwrap_or(serde_json::Value::Null));
        sqlx::query(
            "INSERT INTO batch_jobs \
                 (batch_id, user_id, status, shared_prompt, individual_prompts, \
                  child_job_ids, completed_count, total_count, \
                  created_at, updated_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(batch.batch_id)
        .bind(&batch.user_id)
        .bind(batch.status.as_str())
        .bind(&batch.shared_prompt)
        .bind(individual_prompts)
        .bind(&batch.child_job_ids)
        .bind(batch.completed_count as i32)
        .bind(batch.total_count as i32)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .bind(batch.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify_insert_error(e, "batch", batch.batch_id))?;
        Ok(())
    }

    async fn find_batch(&self, batch_id: Uuid) -> Result<BatchJob, RepoError> {
        let query = format!("SELECT {BATCH_COLUMNS} FROM batch_jobs WHERE batch_id = $1");
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::storage)?
            .ok_or(RepoError::NotFound {
                entity: "batch",
                id: batch_id,
            })?
            .try_into()
    }

    async fn update_batch_progress(
        &self,
        batch_id: Uuid,
        expected_completed: u32,
        update: BatchProgressUpdate,
    ) -> Result<BatchJob, RepoError> {
        let query = format!(
            "UPDATE batch_jobs \
             SET completed_count = $3, status = $4, \
                 updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond') \
             WHERE batch_id = $1 AND completed_count = $2 \
             RETURNING {BATCH_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BatchRow>(&query)
            .bind(batch_id)
            .bind(expected_completed as i32)
            .bind(update.completed_count as i32)
            .bind(update.status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::storage)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current: Option<i32> =
                    sqlx::query_scalar("SELECT completed_count FROM batch_jobs WHERE batch_id = $1")
                        .bind(batch_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(RepoError::storage)?;
                match current {
                    Some(current) => Err(RepoError::Conflict(format!(
                        "batch {batch_id} completed_count is {current}, expected {expected_completed}"
                    ))),
                    None => Err(RepoError::NotFound {
                        entity: "batch",
                        id: batch_id,
                    }),
                }
            }
        }
    }

    async fn append_batch_child(
        &self,
        batch_id: Uuid,
        job_id: Uuid,
    ) -> Result<BatchJob, RepoError> {
        let query = format!(
            "UPDATE batch_jobs \
             SET child_job_ids = array_append(child_job_ids, $2), \
                 updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond') \
             WHERE batch_id = $1 \
             RETURNING {BATCH_COLUMNS}"
        );
        sqlx::query_as::<_, BatchRow>(&query)
            .bind(batch_id)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::storage)?
            .ok_or(RepoError::NotFound {
                entity: "batch",
                id: batch_id,
            })?
            .try_into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
