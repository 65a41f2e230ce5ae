//! Adapter-neutral request/result types and the provider traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::outcome::ResilienceOutcome;

/// Input to an analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Readable (presigned) URL of the optimized image.
    pub image_url: String,
    /// Prompt guiding the analysis.
    pub prompt: String,
}

/// What the analysis provider said about the image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis: String,
}

/// Input to an editing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    /// Readable (presigned) URL of the optimized image.
    pub image_url: String,
    /// Analysis text steering the edit.
    pub analysis: String,
    /// Editing instructions appended to the analysis.
    pub instructions: String,
}

/// The editing provider's output.
///
/// `output_url` may legitimately be absent on a successful call — the
/// orchestrator treats that as "no usable output" and takes the copy
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResult {
    pub output_url: Option<String>,
}

/// Image analysis provider.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Stable adapter name for logs and telemetry.
    fn name(&self) -> &str;

    /// Cheap liveness probe, independent of the resilience policy.
    async fn is_healthy(&self) -> bool;

    async fn analyze(&self, request: &AnalysisRequest) -> ResilienceOutcome<AnalysisResult>;
}

/// Image editing provider.
#[async_trait]
pub trait EditingProvider: Send + Sync {
    /// Stable adapter name for logs and telemetry.
    fn name(&self) -> &str;

    /// Cheap liveness probe, independent of the resilience policy.
    async fn is_healthy(&self) -> bool;

    async fn edit(&self, request: &EditRequest) -> ResilienceOutcome<EditResult>;
}
