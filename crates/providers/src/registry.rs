//! Provider registry: resolves configured adapter kinds to concrete
//! instances at process start and owns them for the process lifetime.

use std::sync::Arc;

use crate::gemini::{GeminiAnalysis, GeminiConfig};
use crate::seedream::{SeedreamConfig, SeedreamEditing};
use crate::stub::{StubAnalysis, StubEditing};
use crate::traits::{AnalysisProvider, EditingProvider};

/// Adapter kind string for the Gemini analysis provider.
pub const KIND_GEMINI: &str = "gemini";
/// Adapter kind string for the Seedream editing provider.
pub const KIND_SEEDREAM: &str = "seedream";
/// Adapter kind string for the deterministic stubs.
pub const KIND_STUB: &str = "stub";

/// Registry construction failure — bad adapter kind in configuration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown {role} provider kind: '{kind}'")]
    UnknownKind { role: &'static str, kind: String },
}

/// Adapter selection plus per-adapter configuration.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    /// `"gemini"` or `"stub"`.
    pub analysis_kind: String,
    /// `"seedream"` or `"stub"`.
    pub editing_kind: String,
    pub gemini: GeminiConfig,
    pub seedream: SeedreamConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            analysis_kind: KIND_GEMINI.into(),
            editing_kind: KIND_SEEDREAM.into(),
            gemini: GeminiConfig::default(),
            seedream: SeedreamConfig::default(),
        }
    }
}

/// Per-adapter liveness snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RegistryHealth {
    pub analysis: bool,
    pub editing: bool,
}

/// Owns the configured analysis and editing adapters.
///
/// Constructed once at process start; each adapter carries its own
/// [`ResilienceEngine`](crate::ResilienceEngine), so breaker and
/// bulkhead state is per (adapter, process).
pub struct ProviderRegistry {
    analysis: Arc<dyn AnalysisProvider>,
    editing: Arc<dyn EditingProvider>,
}

impl ProviderRegistry {
    /// Resolve the configured kinds to concrete adapters.
    pub fn from_config(config: ProvidersConfig) -> Result<Self, RegistryError> {
        let analysis: Arc<dyn AnalysisProvider> = match config.analysis_kind.as_str() {
            KIND_GEMINI => Arc::new(GeminiAnalysis::new(config.gemini)),
            KIND_STUB => Arc::new(StubAnalysis::new()),
            other => {
                return Err(RegistryError::UnknownKind {
                    role: "analysis",
                    kind: other.to_string(),
                })
            }
        };

        let editing: Arc<dyn EditingProvider> = match config.editing_kind.as_str() {
            KIND_SEEDREAM => Arc::new(SeedreamEditing::new(config.seedream)),
            KIND_STUB => Arc::new(StubEditing::new()),
            other => {
                return Err(RegistryError::UnknownKind {
                    role: "editing",
                    kind: other.to_string(),
                })
            }
        };

        tracing::info!(
            analysis = analysis.name(),
            editing = editing.name(),
            "Provider registry initialized"
        );
        Ok(Self { analysis, editing })
    }

    /// Registry over explicitly constructed adapters.
    pub fn with_adapters(
        analysis: Arc<dyn AnalysisProvider>,
        editing: Arc<dyn EditingProvider>,
    ) -> Self {
        Self { analysis, editing }
    }

    /// Registry with both roles stubbed, for tests and offline runs.
    pub fn stubbed() -> Self {
        Self {
            analysis: Arc::new(StubAnalysis::new()),
            editing: Arc::new(StubEditing::new()),
        }
    }

    pub fn analysis(&self) -> Arc<dyn AnalysisProvider> {
        Arc::clone(&self.analysis)
    }

    pub fn editing(&self) -> Arc<dyn EditingProvider> {
        Arc::clone(&self.editing)
    }

    /// Probe both adapters concurrently.
    pub async fn health(&self) -> RegistryHealth {
        let (analysis, editing) =
            tokio::join!(self.analysis.is_healthy(), self.editing.is_healthy());
        RegistryHealth { analysis, editing }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn stub_kinds_resolve() {
        let registry = ProviderRegistry::from_config(ProvidersConfig {
            analysis_kind: KIND_STUB.into(),
            editing_kind: KIND_STUB.into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(registry.analysis().name(), "stub-analysis");
        assert_eq!(registry.editing().name(), "stub-editing");
    }

    #[test]
    fn production_kinds_resolve() {
        let registry = ProviderRegistry::from_config(ProvidersConfig::default()).unwrap();
        assert_eq!(registry.analysis().name(), "gemini");
        assert_eq!(registry.editing().name(), "seedream");
    }

    #[test]
    fn unknown_analysis_kind_is_a_configuration_error() {
        let err = ProviderRegistry::from_config(ProvidersConfig {
            analysis_kind: "dalle".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert_matches!(err, RegistryError::UnknownKind { role: "analysis", .. });
    }

    #[test]
    fn unknown_editing_kind_is_a_configuration_error() {
        let err = ProviderRegistry::from_config(ProvidersConfig {
            editing_kind: "sketchy".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert_matches!(err, RegistryError::UnknownKind { role: "editing", .. });
    }

    #[tokio::test]
    async fn stubbed_registry_reports_healthy() {
        let health = ProviderRegistry::stubbed().health().await;
        assert!(health.analysis);
        assert!(health.editing);
    }
}
