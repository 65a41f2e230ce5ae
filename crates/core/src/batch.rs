//! Batch aggregate and the pure progress-increment rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::job::{require_non_empty, JOB_TTL_DAYS};
use crate::status::BatchStatus;

// ---------------------------------------------------------------------------
// BatchJob
// ---------------------------------------------------------------------------

/// Aggregate record tracking N sibling jobs from one multi-file submission.
///
/// `total_count` is fixed at creation. `completed_count` advances exactly
/// once per terminal child (success or failure both count) and never
/// decreases; advancing past `total_count` is a validation error, not a
/// silent clamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: Uuid,
    pub user_id: String,
    pub status: BatchStatus,
    /// Prompt applied to every child unless overridden per file.
    pub shared_prompt: Option<String>,
    /// Per-file prompt overrides, parallel to the submission order.
    pub individual_prompts: Option<Vec<Option<String>>>,
    /// Child job ids in submission order. Append-only.
    pub child_job_ids: Vec<Uuid>,
    pub completed_count: u32,
    pub total_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a new [`BatchJob`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatchJob {
    pub user_id: String,
    pub file_count: u32,
    pub shared_prompt: Option<String>,
    pub individual_prompts: Option<Vec<Option<String>>>,
}

/// Result of the pure batch-increment computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchIncrement {
    pub completed_count: u32,
    pub status: BatchStatus,
}

impl BatchJob {
    /// Construct a new batch with its total fixed at `file_count`.
    pub fn new(input: NewBatchJob) -> Result<Self, CoreError> {
        let user_id = require_non_empty("user_id", &input.user_id)?;

        if input.file_count == 0 {
            return Err(CoreError::Validation(
                "file_count must be at least 1".to_string(),
            ));
        }
        if let Some(prompts) = &input.individual_prompts {
            if prompts.len() != input.file_count as usize {
                return Err(CoreError::Validation(format!(
                    "individual_prompts has {} entries but file_count is {}",
                    prompts.len(),
                    input.file_count
                )));
            }
        }

        let now = Utc::now();
        Ok(Self {
            batch_id: Uuid::now_v7(),
            user_id,
            status: BatchStatus::Processing,
            shared_prompt: input.shared_prompt.filter(|p| !p.trim().is_empty()),
            individual_prompts: input.individual_prompts,
            child_job_ids: Vec::new(),
            completed_count: 0,
            total_count: input.file_count,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(JOB_TTL_DAYS),
        })
    }

    /// Compute the next counter value and status for one child completion.
    ///
    /// Pure — does not mutate the batch. Returns a validation error when
    /// the batch is already fully counted (over-increment).
    pub fn compute_increment(&self) -> Result<BatchIncrement, CoreError> {
        if self.completed_count >= self.total_count {
            return Err(CoreError::Validation(format!(
                "Batch {} already complete ({}/{})",
                self.batch_id, self.completed_count, self.total_count
            )));
        }
        let completed_count = self.completed_count + 1;
        let status = if completed_count == self.total_count {
            BatchStatus::Completed
        } else {
            self.status
        };
        Ok(BatchIncrement {
            completed_count,
            status,
        })
    }

    /// Whether every child has reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.completed_count == self.total_count
    }

    /// Expiry as epoch seconds, for TTL-attribute stores.
    pub fn expires_at_epoch(&self) -> i64 {
        self.expires_at.timestamp()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
