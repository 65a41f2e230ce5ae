//! Seedream editing adapter.
//!
//! One image-generation POST per invocation, executed through this
//! adapter's [`ResilienceEngine`]. Response-shape mapping lives in
//! [`parse_edit_response`]; note the distinction between a malformed
//! payload (failed outcome) and a well-formed payload that simply has no
//! output URL (successful outcome with `output_url: None`, which routes
//! the pipeline through the copy fallback).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ResilienceConfig;
use crate::engine::ResilienceEngine;
use crate::error::ProviderError;
use crate::outcome::ResilienceOutcome;
use crate::traits::{EditRequest, EditResult, EditingProvider};

/// Adapter name reported in outcomes and logs.
const PROVIDER_NAME: &str = "seedream";

/// Timeout for the health probe, outside the engine policy.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the Seedream adapter.
#[derive(Debug, Clone)]
pub struct SeedreamConfig {
    pub enabled: bool,
    pub api_key: String,
    /// Base URL, e.g. `https://ark.ap-southeast.bytepluses.com`.
    pub base_url: String,
    /// Model id, e.g. `seedream-4-0`.
    pub model: String,
    pub resilience: ResilienceConfig,
}

impl Default for SeedreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: "https://ark.ap-southeast.bytepluses.com".into(),
            model: "seedream-4-0".into(),
            resilience: ResilienceConfig::default(),
        }
    }
}

/// Seedream-backed [`EditingProvider`].
pub struct SeedreamEditing {
    config: SeedreamConfig,
    engine: ResilienceEngine,
    client: reqwest::Client,
}

impl SeedreamEditing {
    pub fn new(config: SeedreamConfig) -> Self {
        let engine = ResilienceEngine::new(PROVIDER_NAME, config.resilience.clone());
        Self {
            config,
            engine,
            client: reqwest::Client::new(),
        }
    }

    /// One outbound edit request.
    async fn request_edit(&self, request: &EditRequest) -> Result<EditResult, ProviderError> {
        let url = format!("{}/api/v3/images/generations", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": format!("{}\n\n{}", request.analysis, request.instructions),
            "image": [request.image_url],
            "response_format": "url",
            "watermark": false,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        parse_edit_response(&payload).map(|output_url| EditResult { output_url })
    }
}

#[async_trait]
impl EditingProvider for SeedreamEditing {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn is_healthy(&self) -> bool {
        // The generations endpoint requires auth; a bare GET against the
        // base URL answering at all is the cheapest liveness signal.
        match self
            .client
            .get(&self.config.base_url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(provider = PROVIDER_NAME, error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn edit(&self, request: &EditRequest) -> ResilienceOutcome<EditResult> {
        if !self.config.enabled {
            return ResilienceOutcome::disabled(PROVIDER_NAME);
        }
        self.engine.execute(|| self.request_edit(request)).await
    }
}

/// Pull the output image URL out of a generations response body.
///
/// Returns `Ok(None)` when the payload is well-formed but carries no
/// URL — the caller decides what a missing output means. A payload
/// without the expected `data` array is malformed.
pub(crate) fn parse_edit_response(payload: &Value) -> Result<Option<String>, ProviderError> {
    let data = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::MalformedResponse("missing data array".into()))?;

    Ok(data
        .first()
        .and_then(|entry| entry.get("url"))
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(String::from))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
