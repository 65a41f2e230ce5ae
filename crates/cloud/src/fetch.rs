//! Single-purpose HTTP fetcher for retrieving a provider's output image.

use std::time::Duration;

use async_trait::async_trait;

/// Hard cap on a fetched response body.
const MAX_FETCH_BYTES: usize = 25 * 1024 * 1024;

/// Request timeout for one fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from fetching a provider output URL.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Fetch returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Retrieves bytes from a URL.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed [`HttpFetcher`] with a size cap.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            max_bytes: MAX_FETCH_BYTES,
        }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if bytes.len() > self.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(bytes.to_vec())
    }
}
