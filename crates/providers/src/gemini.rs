//! Gemini analysis adapter.
//!
//! One `generateContent` POST per invocation, executed through this
//! adapter's [`ResilienceEngine`]. Response-shape mapping lives in
//! [`parse_analysis_response`] so the payload handling is testable
//! without HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ResilienceConfig;
use crate::engine::ResilienceEngine;
use crate::error::ProviderError;
use crate::outcome::ResilienceOutcome;
use crate::traits::{AnalysisProvider, AnalysisRequest, AnalysisResult};

/// Adapter name reported in outcomes and logs.
const PROVIDER_NAME: &str = "gemini";

/// Timeout for the health probe, outside the engine policy.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the Gemini adapter.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub enabled: bool,
    pub api_key: String,
    /// Base URL, e.g. `https://generativelanguage.googleapis.com`.
    pub base_url: String,
    /// Model id, e.g. `gemini-2.0-flash`.
    pub model: String,
    pub resilience: ResilienceConfig,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-2.0-flash".into(),
            resilience: ResilienceConfig::default(),
        }
    }
}

/// Gemini-backed [`AnalysisProvider`].
pub struct GeminiAnalysis {
    config: GeminiConfig,
    engine: ResilienceEngine,
    client: reqwest::Client,
}

impl GeminiAnalysis {
    pub fn new(config: GeminiConfig) -> Self {
        let engine = ResilienceEngine::new(PROVIDER_NAME, config.resilience.clone());
        Self {
            config,
            engine,
            client: reqwest::Client::new(),
        }
    }

    /// One outbound analysis request.
    async fn request_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": request.prompt },
                    { "file_data": { "file_uri": request.image_url, "mime_type": "image/jpeg" } },
                ],
            }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
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
        parse_analysis_response(&payload).map(|analysis| AnalysisResult { analysis })
    }
}

#[async_trait]
impl AnalysisProvider for GeminiAnalysis {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/v1beta/models", self.config.base_url);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(provider = PROVIDER_NAME, error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn analyze(&self, request: &AnalysisRequest) -> ResilienceOutcome<AnalysisResult> {
        if !self.config.enabled {
            return ResilienceOutcome::disabled(PROVIDER_NAME);
        }
        self.engine
            .execute(|| self.request_analysis(request))
            .await
    }
}

/// Pull the analysis text out of a `generateContent` response body.
///
/// A 2xx payload without the expected text parts is a
/// [`ProviderError::MalformedResponse`], never a panic.
pub(crate) fn parse_analysis_response(payload: &Value) -> Result<String, ProviderError> {
    let parts = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ProviderError::MalformedResponse("missing candidates[0].content.parts".into())
        })?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(
            "response contains no text parts".into(),
        ));
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
