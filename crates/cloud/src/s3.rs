//! S3-backed [`BlobStore`].
//!
//! The optimize step downloads the source, re-encodes it as a bounded
//! JPEG on a blocking thread, and uploads the rendition. Non-image or
//! unsupported payloads pass through unmodified.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::blob::{BlobError, BlobStore, ObjectRef};

/// Longest edge of an optimized rendition, in pixels.
const MAX_EDGE: u32 = 2048;

/// JPEG quality for optimized renditions.
const JPEG_QUALITY: u8 = 85;

/// S3 client wrapper implementing [`BlobStore`].
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a store from the ambient AWS environment (region, creds).
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }

    async fn get_bytes(&self, obj: &ObjectRef) -> Result<Vec<u8>, BlobError> {
        let output = self
            .client
            .get_object()
            .bucket(&obj.bucket)
            .key(&obj.key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    BlobError::NotFound(obj.to_string())
                } else {
                    BlobError::Request(service.to_string())
                }
            })?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Request(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }
}

/// Re-encode an image as a bounded JPEG.
///
/// Returns `None` when the payload cannot be decoded, in which case the
/// caller stores the original bytes untouched.
fn transcode_to_jpeg(bytes: &[u8]) -> Option<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).ok()?;

    let resized = if decoded.width().max(decoded.height()) > MAX_EDGE {
        decoded.resize(MAX_EDGE, MAX_EDGE, FilterType::Lanczos3)
    } else {
        decoded
    };

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), JPEG_QUALITY);
    resized.to_rgb8().write_with_encoder(encoder).ok()?;
    Some(out)
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn optimize_and_store(&self, src: &ObjectRef, dst: &ObjectRef) -> Result<(), BlobError> {
        let original = self.get_bytes(src).await?;
        let original_len = original.len();

        // Image decode/encode is CPU-bound; keep it off the runtime.
        let transcoded = tokio::task::spawn_blocking(move || transcode_to_jpeg(&original))
            .await
            .map_err(|e| BlobError::Request(format!("transcode task failed: {e}")))?;

        let (bytes, content_type) = match transcoded {
            Some(jpeg) => (jpeg, "image/jpeg"),
            None => {
                tracing::warn!(src = %src, "Source not decodable, storing original bytes");
                return self.copy(src, dst).await;
            }
        };

        tracing::debug!(
            src = %src,
            dst = %dst,
            original_bytes = original_len,
            optimized_bytes = bytes.len(),
            "Optimized rendition stored"
        );
        self.put(dst, bytes, content_type).await
    }

    async fn copy(&self, src: &ObjectRef, dst: &ObjectRef) -> Result<(), BlobError> {
        self.client
            .copy_object()
            .copy_source(format!("{}/{}", src.bucket, src.key))
            .bucket(&dst.bucket)
            .key(&dst.key)
            .send()
            .await
            .map_err(|e| BlobError::Request(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn put(
        &self,
        dst: &ObjectRef,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BlobError> {
        self.client
            .put_object()
            .bucket(&dst.bucket)
            .key(&dst.key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| BlobError::Request(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn delete(&self, obj: &ObjectRef) -> Result<(), BlobError> {
        // DeleteObject on a missing key succeeds, matching the trait
        // contract.
        self.client
            .delete_object()
            .bucket(&obj.bucket)
            .key(&obj.key)
            .send()
            .await
            .map_err(|e| BlobError::Request(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn presigned_download_url(
        &self,
        obj: &ObjectRef,
        expires_in: Duration,
    ) -> Result<String, BlobError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| BlobError::Presign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&obj.bucket)
            .key(&obj.key)
            .presigned(presigning)
            .await
            .map_err(|e| BlobError::Presign(e.into_service_error().to_string()))?;
        Ok(request.uri().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
