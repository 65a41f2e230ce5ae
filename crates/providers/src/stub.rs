//! Deterministic stub adapters for environments without live provider
//! credentials.
//!
//! Both stubs run through a real [`ResilienceEngine`] so the outcome
//! envelope looks exactly like production. The editing stub returns a
//! successful result with no output reference, which routes the
//! pipeline through the copy fallback — no network ever happens.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ResilienceConfig;
use crate::engine::ResilienceEngine;
use crate::error::ProviderError;
use crate::outcome::ResilienceOutcome;
use crate::traits::{
    AnalysisProvider, AnalysisRequest, AnalysisResult, EditRequest, EditResult, EditingProvider,
};

/// Simulated provider latency.
const STUB_DELAY: Duration = Duration::from_millis(50);

/// Canned analysis text.
const STUB_ANALYSIS: &str =
    "Stub analysis: well-lit subject, neutral white balance, no edits required.";

/// Stub [`AnalysisProvider`].
pub struct StubAnalysis {
    engine: ResilienceEngine,
    delay: Duration,
}

impl StubAnalysis {
    pub fn new() -> Self {
        Self {
            engine: ResilienceEngine::new("stub-analysis", ResilienceConfig::default()),
            delay: STUB_DELAY,
        }
    }
}

impl Default for StubAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisProvider for StubAnalysis {
    fn name(&self) -> &str {
        "stub-analysis"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> ResilienceOutcome<AnalysisResult> {
        let delay = self.delay;
        self.engine
            .execute(|| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, ProviderError>(AnalysisResult {
                    analysis: STUB_ANALYSIS.to_string(),
                })
            })
            .await
    }
}

/// Stub [`EditingProvider`].
pub struct StubEditing {
    engine: ResilienceEngine,
    delay: Duration,
}

impl StubEditing {
    pub fn new() -> Self {
        Self {
            engine: ResilienceEngine::new("stub-editing", ResilienceConfig::default()),
            delay: STUB_DELAY,
        }
    }
}

impl Default for StubEditing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EditingProvider for StubEditing {
    fn name(&self) -> &str {
        "stub-editing"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn edit(&self, _request: &EditRequest) -> ResilienceOutcome<EditResult> {
        let delay = self.delay;
        self.engine
            .execute(|| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, ProviderError>(EditResult { output_url: None })
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_analysis_is_deterministic() {
        let stub = StubAnalysis::new();
        let request = AnalysisRequest {
            image_url: "https://example.com/a.jpg".into(),
            prompt: "describe".into(),
        };
        let first = stub.analyze(&request).await.into_result().unwrap();
        let second = stub.analyze(&request).await.into_result().unwrap();
        assert_eq!(first.analysis, second.analysis);
        assert!(stub.is_healthy().await);
    }

    #[tokio::test]
    async fn stub_editing_returns_no_output_reference() {
        let stub = StubEditing::new();
        let outcome = stub
            .edit(&EditRequest {
                image_url: "https://example.com/a.jpg".into(),
                analysis: "fine as is".into(),
                instructions: "enhance".into(),
            })
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.into_result().unwrap().output_url, None);
    }
}
