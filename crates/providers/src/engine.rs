//! The resilience engine: timeout, retry-with-backoff, circuit breaker,
//! and optional bulkhead around an arbitrary async operation.
//!
//! One engine instance exists per (adapter, process) lifetime — the
//! breaker and bulkhead counters are shared across every in-flight job
//! hitting the same adapter, not scoped to a single call.

use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::breaker::CircuitBreaker;
use crate::bulkhead::Bulkhead;
use crate::config::ResilienceConfig;
use crate::error::ProviderError;
use crate::outcome::{ResilienceOutcome, ResilienceTelemetry};

/// Executes operations under one adapter's resilience policy.
pub struct ResilienceEngine {
    provider: String,
    config: ResilienceConfig,
    breaker: CircuitBreaker,
    bulkhead: Option<Bulkhead>,
}

impl ResilienceEngine {
    pub fn new(provider: impl Into<String>, config: ResilienceConfig) -> Self {
        let provider = provider.into();
        let breaker = CircuitBreaker::new(config.breaker.clone());
        let bulkhead = config
            .bulkhead
            .enabled
            .then(|| Bulkhead::new(provider.clone(), &config.bulkhead));
        Self {
            provider,
            config,
            breaker,
            bulkhead,
        }
    }

    /// Adapter name this engine reports in outcomes.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The shared breaker (exposed for health reporting).
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `operation` under the full policy.
    ///
    /// Order of gates: bulkhead admission, then breaker admission, then
    /// the retry loop where each attempt races the configured timeout.
    /// A timeout counts as a retryable failure. The returned outcome
    /// always carries the attempts made beyond the first and the breaker
    /// state observed after the call.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ResilienceOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let started = Instant::now();
        let timestamp = Utc::now();

        let _permit = match &self.bulkhead {
            Some(bulkhead) => match bulkhead.acquire().await {
                Ok(permit) => Some(permit),
                Err(err) => {
                    tracing::warn!(provider = %self.provider, "Bulkhead rejected call");
                    return self.finish(Err(err), 0, started, timestamp);
                }
            },
            None => None,
        };

        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempts_made: u32 = 0;
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..max_attempts {
            if !self.breaker.is_call_permitted() {
                // Short-circuited before the first attempt: report the open
                // breaker. Opened by this call's own failures mid-retry: the
                // operation's last failure is the more useful error.
                if last_error.is_none() {
                    tracing::warn!(provider = %self.provider, "Circuit open, short-circuiting");
                    last_error = Some(ProviderError::CircuitOpen(self.provider.clone()));
                }
                break;
            }

            if attempt > 0 {
                tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
            }
            attempts_made = attempt + 1;

            match tokio::time::timeout(self.config.timeout, operation()).await {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    return self.finish(Ok(value), attempt, started, timestamp);
                }
                Ok(Err(err)) => {
                    self.breaker.record_failure();
                    tracing::warn!(
                        provider = %self.provider,
                        attempt = attempt + 1,
                        error = %err,
                        "Provider attempt failed"
                    );
                    last_error = Some(err);
                }
                Err(_elapsed) => {
                    self.breaker.record_failure();
                    let timeout_ms = self.config.timeout.as_millis() as u64;
                    tracing::warn!(
                        provider = %self.provider,
                        attempt = attempt + 1,
                        timeout_ms,
                        "Provider attempt timed out"
                    );
                    last_error = Some(ProviderError::Timeout(timeout_ms));
                }
            }
        }

        let err = last_error.expect("retry loop ran at least one gate");
        self.finish(
            Err(err),
            attempts_made.saturating_sub(1),
            started,
            timestamp,
        )
    }

    fn finish<T>(
        &self,
        result: Result<T, ProviderError>,
        retry_attempts: u32,
        started: Instant,
        timestamp: DateTime<Utc>,
    ) -> ResilienceOutcome<T> {
        ResilienceOutcome {
            result,
            provider: self.provider.clone(),
            duration: started.elapsed(),
            timestamp,
            telemetry: ResilienceTelemetry {
                retry_attempts,
                breaker_state: self.breaker.state(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::config::{BackoffKind, BreakerConfig, BulkheadConfig, RetryPolicy};
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(config: ResilienceConfig) -> ResilienceEngine {
        ResilienceEngine::new("test-provider", config)
    }

    fn fast_config() -> ResilienceConfig {
        ResilienceConfig::fast_for_tests()
    }

    #[tokio::test]
    async fn first_attempt_success_has_no_retries() {
        let engine = engine(fast_config());
        let outcome = engine.execute(|| async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(outcome.result.unwrap(), 7);
        assert_eq!(outcome.telemetry.retry_attempts, 0);
        assert_eq!(outcome.telemetry.breaker_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn fails_twice_then_succeeds_reports_two_retries() {
        let engine = engine(fast_config());
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = engine
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::Http {
                            status: 503,
                            body: "unavailable".into(),
                        })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.telemetry.retry_attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_carry_the_last_error() {
        let engine = engine(fast_config());
        let outcome: ResilienceOutcome<()> = engine
            .execute(|| async {
                Err(ProviderError::Http {
                    status: 500,
                    body: "boom".into(),
                })
            })
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.telemetry.retry_attempts, 2);
        assert_matches!(
            outcome.result,
            Err(ProviderError::Http { status: 500, .. })
        );
    }

    #[tokio::test]
    async fn timeout_counts_as_retryable_failure() {
        let mut config = fast_config();
        config.timeout = Duration::from_millis(10);
        config.retry.max_attempts = 2;
        let engine = engine(config);

        let outcome: ResilienceOutcome<()> = engine
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert_matches!(outcome.result, Err(ProviderError::Timeout(10)));
        assert_eq!(outcome.telemetry.retry_attempts, 1);
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_invoking_operation() {
        let mut config = fast_config();
        config.retry.max_attempts = 1;
        config.breaker.failure_threshold = 2;
        config.breaker.half_open_after = Duration::from_secs(60);
        let engine = engine(config);

        for _ in 0..2 {
            let _: ResilienceOutcome<()> = engine
                .execute(|| async {
                    Err(ProviderError::Http {
                        status: 502,
                        body: "bad gateway".into(),
                    })
                })
                .await;
        }

        let calls = Arc::new(AtomicU32::new(0));
        let outcome: ResilienceOutcome<()> = engine
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0, "operation must not run");
        assert_matches!(outcome.result, Err(ProviderError::CircuitOpen(_)));
        assert_eq!(outcome.telemetry.retry_attempts, 0);
        assert_eq!(outcome.telemetry.breaker_state, CircuitState::Open);
    }

    #[tokio::test]
    async fn breaker_recovers_through_half_open() {
        let mut config = fast_config();
        config.retry.max_attempts = 1;
        config.breaker.failure_threshold = 1;
        config.breaker.half_open_after = Duration::from_millis(10);
        config.breaker.success_threshold = 1;
        let engine = engine(config);

        let _: ResilienceOutcome<()> = engine
            .execute(|| async {
                Err(ProviderError::Http {
                    status: 500,
                    body: "down".into(),
                })
            })
            .await;
        assert_eq!(engine.breaker().state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let outcome = engine.execute(|| async { Ok::<_, ProviderError>(1) }).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.telemetry.breaker_state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn bulkhead_overflow_is_reported_in_the_outcome() {
        let mut config = fast_config();
        config.bulkhead = BulkheadConfig {
            enabled: true,
            max_concurrent: 1,
            max_queued: 0,
        };
        config.timeout = Duration::from_secs(5);
        let engine = Arc::new(engine(config));

        let slow = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, ProviderError>(())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rejected: ResilienceOutcome<()> =
            engine.execute(|| async { Ok(()) }).await;
        assert_matches!(rejected.result, Err(ProviderError::BulkheadFull(_)));
        assert_eq!(rejected.telemetry.retry_attempts, 0);

        assert!(slow.await.unwrap().is_success());
    }

    #[tokio::test]
    async fn constant_backoff_policy_is_honored() {
        let mut config = fast_config();
        config.retry = RetryPolicy {
            max_attempts: 3,
            backoff: BackoffKind::Constant,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
        };
        config.breaker = BreakerConfig {
            enabled: true,
            failure_threshold: 10,
            half_open_after: Duration::from_secs(60),
            success_threshold: 1,
        };
        let engine = engine(config);

        let started = Instant::now();
        let outcome: ResilienceOutcome<()> = engine
            .execute(|| async {
                Err(ProviderError::Request("connection refused".into()))
            })
            .await;

        // Two backoff sleeps of ~5 ms each.
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(outcome.telemetry.retry_attempts, 2);
    }
}
