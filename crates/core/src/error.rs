use crate::status::JobStatus;

/// Domain-level error type.
///
/// Expected failures only — every variant maps to a caller mistake or an
/// illegal state request, never to infrastructure trouble. Store and
/// provider failures have their own error types in the owning crates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}
