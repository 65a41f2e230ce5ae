//! Job entity and construction/validation rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::status::JobStatus;

/// Days a job record is retained before the store's TTL reaps it.
pub const JOB_TTL_DAYS: i64 = 90;

/// Default locale for notification payloads when the client sent none.
pub const DEFAULT_LOCALE: &str = "en";

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One image's end-to-end processing record.
///
/// Invariants maintained by the service layer:
/// - `status` only moves along the edges of the state machine.
/// - `final_key` is set if and only if `status == Completed`.
/// - `error` is set if and only if `status == Failed`.
/// - `expires_at` is immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub user_id: String,
    /// Original file name of the uploaded object; feeds key derivation.
    pub file_name: String,
    pub status: JobStatus,
    /// Optional user prompt guiding both analysis and editing.
    pub prompt: Option<String>,
    /// BCP-47-ish language tag for notification text, e.g. `"en"`, `"es"`.
    pub locale: String,
    /// Transient (optimized) object key, set when processing starts.
    pub temp_key: Option<String>,
    /// Final library object key, set on completion.
    pub final_key: Option<String>,
    /// Human-readable failure reason, set on failure.
    pub error: Option<String>,
    /// Back-reference to the owning batch, if this job came from a
    /// multi-file submission.
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a new [`Job`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub user_id: String,
    pub file_name: String,
    pub prompt: Option<String>,
    pub locale: Option<String>,
    pub batch_id: Option<Uuid>,
}

impl Job {
    /// Construct a new queued job from validated input.
    ///
    /// Assigns a v7 (time-ordered) id, stamps `created_at == updated_at`,
    /// and derives `expires_at` as creation time plus [`JOB_TTL_DAYS`].
    pub fn new(input: NewJob) -> Result<Self, CoreError> {
        let user_id = require_non_empty("user_id", &input.user_id)?;
        let file_name = require_non_empty("file_name", &input.file_name)?;

        let now = Utc::now();
        Ok(Self {
            job_id: Uuid::now_v7(),
            user_id,
            file_name,
            status: JobStatus::Queued,
            prompt: input.prompt.filter(|p| !p.trim().is_empty()),
            locale: input
                .locale
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            temp_key: None,
            final_key: None,
            error: None,
            batch_id: input.batch_id,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(JOB_TTL_DAYS),
        })
    }

    /// Expiry as epoch seconds, for TTL-attribute stores.
    pub fn expires_at_epoch(&self) -> i64 {
        self.expires_at.timestamp()
    }
}

/// Trim and reject an empty required string field.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewJob {
        NewJob {
            user_id: "user-1".into(),
            file_name: "beach.jpg".into(),
            prompt: Some("enhance".into()),
            locale: Some("es".into()),
            batch_id: None,
        }
    }

    #[test]
    fn new_job_starts_queued() {
        let job = Job::new(input()).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.temp_key.is_none());
        assert!(job.final_key.is_none());
        assert!(job.error.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn new_job_expires_after_ttl() {
        let job = Job::new(input()).unwrap();
        assert_eq!(job.expires_at, job.created_at + Duration::days(JOB_TTL_DAYS));
        assert_eq!(job.expires_at_epoch(), job.expires_at.timestamp());
    }

    #[test]
    fn empty_user_id_rejected() {
        let mut bad = input();
        bad.user_id = "   ".into();
        assert!(Job::new(bad).is_err());
    }

    #[test]
    fn empty_file_name_rejected() {
        let mut bad = input();
        bad.file_name = String::new();
        assert!(Job::new(bad).is_err());
    }

    #[test]
    fn blank_prompt_normalized_to_none() {
        let mut raw = input();
        raw.prompt = Some("  ".into());
        let job = Job::new(raw).unwrap();
        assert!(job.prompt.is_none());
    }

    #[test]
    fn missing_locale_falls_back_to_default() {
        let mut raw = input();
        raw.locale = None;
        let job = Job::new(raw).unwrap();
        assert_eq!(job.locale, DEFAULT_LOCALE);
    }

    #[test]
    fn job_ids_are_unique() {
        let a = Job::new(input()).unwrap();
        let b = Job::new(input()).unwrap();
        assert_ne!(a.job_id, b.job_id);
    }
}
