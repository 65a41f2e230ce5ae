//! The per-call outcome envelope returned by the resilience layer.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::breaker::CircuitState;
use crate::error::ProviderError;

/// Resilience telemetry attached to every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilienceTelemetry {
    /// Attempts made beyond the first (0 when the first attempt decided).
    pub retry_attempts: u32,
    /// Breaker state observed after the call finished.
    pub breaker_state: CircuitState,
}

/// Envelope wrapping one provider invocation.
///
/// Created fresh per call and never persisted — callers read the result,
/// log the telemetry, and move on.
#[derive(Debug)]
pub struct ResilienceOutcome<T> {
    pub result: Result<T, ProviderError>,
    /// Adapter name the call went through.
    pub provider: String,
    /// Wall-clock duration of the whole call, retries included.
    pub duration: Duration,
    /// When the call started (UTC).
    pub timestamp: DateTime<Utc>,
    pub telemetry: ResilienceTelemetry,
}

impl<T> ResilienceOutcome<T> {
    /// Outcome for an adapter that is switched off in configuration.
    ///
    /// The engine is never invoked, so no attempts are counted and the
    /// breaker is untouched.
    pub fn disabled(provider: &str) -> Self {
        Self {
            result: Err(ProviderError::Disabled(provider.to_string())),
            provider: provider.to_string(),
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            telemetry: ResilienceTelemetry {
                retry_attempts: 0,
                breaker_state: CircuitState::Closed,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure rendered for logs and job error strings, if any.
    pub fn error_message(&self) -> Option<String> {
        self.result.as_ref().err().map(|e| e.to_string())
    }

    /// Consume the envelope, keeping only the result.
    pub fn into_result(self) -> Result<T, ProviderError> {
        self.result
    }
}
