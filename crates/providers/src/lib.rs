//! External provider adapters and the resilience layer they run behind.
//!
//! Every outbound provider call goes through a [`ResilienceEngine`]
//! combining timeout, retry-with-backoff, a shared circuit breaker, and
//! an optional bulkhead, and comes back as a uniform
//! [`ResilienceOutcome`] envelope. Concrete adapters:
//!
//! - [`GeminiAnalysis`] — image analysis via the Gemini HTTP API.
//! - [`SeedreamEditing`] — image editing via the Seedream HTTP API.
//! - [`StubAnalysis`] / [`StubEditing`] — deterministic canned results
//!   for environments without live credentials.
//!
//! [`ProviderRegistry`] resolves the configured adapter kind to a
//! concrete instance at process start.

pub mod breaker;
pub mod bulkhead;
pub mod config;
pub mod engine;
pub mod error;
pub mod gemini;
pub mod outcome;
pub mod registry;
pub mod seedream;
pub mod stub;
pub mod traits;

pub use breaker::{CircuitBreaker, CircuitState};
pub use bulkhead::Bulkhead;
pub use config::{BackoffKind, BreakerConfig, BulkheadConfig, ResilienceConfig, RetryPolicy};
pub use engine::ResilienceEngine;
pub use error::ProviderError;
pub use gemini::{GeminiAnalysis, GeminiConfig};
pub use outcome::{ResilienceOutcome, ResilienceTelemetry};
pub use registry::{ProviderRegistry, ProvidersConfig, RegistryError, RegistryHealth};
pub use seedream::{SeedreamConfig, SeedreamEditing};
pub use stub::{StubAnalysis, StubEditing};
pub use traits::{
    AnalysisProvider, AnalysisRequest, AnalysisResult, EditRequest, EditResult, EditingProvider,
};
