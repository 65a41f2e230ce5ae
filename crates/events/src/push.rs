//! Push-gateway delivery with exponential-backoff retry.
//!
//! [`PushNotifier`] sends a JSON payload to the push relay endpoint via
//! HTTP POST. Failed attempts are retried up to three times with
//! exponential backoff (1 s, 2 s, 4 s). Device-token management lives
//! behind the gateway, not here.

use std::time::Duration;

use async_trait::async_trait;
use relight_core::{BatchJob, Job, DEFAULT_LOCALE};

use crate::payload::{batch_complete_payload, job_status_payload};
use crate::sink::{NotificationSink, NotifyError};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers notifications to the push gateway.
pub struct PushNotifier {
    client: reqwest::Client,
    /// Gateway endpoint receiving notification payloads.
    notify_url: String,
}

impl PushNotifier {
    /// Create a notifier targeting `gateway_url` (no trailing slash).
    pub fn new(gateway_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            notify_url: format!("{}/notify", gateway_url.trim_end_matches('/')),
        }
    }

    /// Deliver a payload with retry.
    ///
    /// Retries up to 3 times with exponential backoff before giving up.
    /// Returns `Ok(())` on the first successful attempt.
    async fn deliver(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let mut last_err: Option<NotifyError> = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Push delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Push delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.notify_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for PushNotifier {
    async fn notify_job_status(&self, job: &Job) -> Result<(), NotifyError> {
        self.deliver(&job_status_payload(job)).await
    }

    async fn notify_batch_complete(&self, batch: &BatchJob) -> Result<(), NotifyError> {
        // The batch record carries no locale of its own; the gateway
        // re-localizes per device where it can.
        self.deliver(&batch_complete_payload(batch, DEFAULT_LOCALE))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
