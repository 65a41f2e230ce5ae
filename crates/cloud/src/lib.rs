//! Blob-storage collaborator surface: the [`BlobStore`] trait with its
//! S3 implementation, the deterministic [`KeyStrategy`], and the
//! [`HttpFetcher`] used to retrieve provider output images.

pub mod blob;
pub mod fetch;
pub mod keys;
pub mod s3;

pub use blob::{BlobError, BlobStore, ObjectRef};
pub use fetch::{FetchError, HttpFetcher, ReqwestFetcher};
pub use keys::KeyStrategy;
pub use s3::S3BlobStore;
