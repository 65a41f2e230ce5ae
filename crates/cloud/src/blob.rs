//! The blob-storage contract the pipeline is written against.

use std::time::Duration;

use async_trait::async_trait;

/// A bucket/key pair addressing one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Errors from the blob-storage layer.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Presigning failed: {0}")]
    Presign(String),
}

/// Object storage operations the orchestrator needs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read `src`, produce a web-friendly rendition, and write it to
    /// `dst`. Implementations decide the transform; the contract is only
    /// that `dst` exists and is readable afterwards.
    async fn optimize_and_store(&self, src: &ObjectRef, dst: &ObjectRef) -> Result<(), BlobError>;

    /// Server-side copy, no byte round-trip through this process.
    async fn copy(&self, src: &ObjectRef, dst: &ObjectRef) -> Result<(), BlobError>;

    /// Upload raw bytes.
    async fn put(&self, dst: &ObjectRef, bytes: Vec<u8>, content_type: &str)
        -> Result<(), BlobError>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, obj: &ObjectRef) -> Result<(), BlobError>;

    /// Time-limited readable URL for an object.
    async fn presigned_download_url(
        &self,
        obj: &ObjectRef,
        expires_in: Duration,
    ) -> Result<String, BlobError>;
}
