use uuid::Uuid;

/// Error type for the persistence boundary.
///
/// `NotFound`, `AlreadyExists`, and `Conflict` are expected conditions the
/// service layer handles; `Storage` is underlying-store trouble that
/// bubbles to the orchestrator as a job failure.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} with id {id} already exists")]
    AlreadyExists { entity: &'static str, id: Uuid },

    /// A conditional write found the record changed since it was read.
    #[error("Conditional write failed: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RepoError {
    pub(crate) fn storage(err: sqlx::Error) -> Self {
        RepoError::Storage(err.to_string())
    }
}
