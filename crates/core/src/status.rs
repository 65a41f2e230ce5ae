//! Job and batch status enums and the job status state machine.
//!
//! Statuses are stored as lowercase strings (`"queued"`, `"processing"`,
//! ...) in both the durable store and notification payloads. The
//! transition table in [`JobStatus::can_transition_to`] is the single
//! source of truth — callers must go through [`validate_transition`]
//! before issuing any status write.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a single image job.
///
/// Valid edges:
///
/// ```text
/// queued -> processing -> editing -> completed
///    \          |            |
///     +---------+------------+--> failed
/// ```
///
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, waiting for a dispatcher to pick it up.
    Queued,
    /// Image optimization and analysis are underway.
    Processing,
    /// The editing provider is producing the enhanced image.
    Editing,
    /// Terminal: the final image is in the library.
    Completed,
    /// Terminal: a non-recoverable step failed.
    Failed,
}

impl JobStatus {
    /// Stable string form, matching the stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Editing => "editing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "editing" => Ok(JobStatus::Editing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown job status: '{other}'"
            ))),
        }
    }

    /// Whether this status has no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the edge `self -> to` exists in the transition table.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Queued, Processing)
                | (Processing, Editing)
                | (Editing, Completed)
                | (Queued, Failed)
                | (Processing, Failed)
                | (Editing, Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a requested status transition against the transition table.
///
/// Returns [`CoreError::InvalidTransition`] for any edge not present in
/// the table; the caller must not attempt the corresponding write.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

// ---------------------------------------------------------------------------
// BatchStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a batch aggregate.
///
/// A batch is `completed` exactly when `completed_count == total_count`;
/// there is no failed batch status — a failed child still advances the
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// At least one child job has not yet reached a terminal status.
    Processing,
    /// Every child job has reached a terminal status.
    Completed,
}

impl BatchStatus {
    /// Stable string form, matching the stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "processing" => Ok(BatchStatus::Processing),
            "completed" => Ok(BatchStatus::Completed),
            other => Err(CoreError::Validation(format!(
                "Unknown batch status: '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
