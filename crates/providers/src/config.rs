//! Resilience policy configuration.
//!
//! One [`ResilienceConfig`] is attached to each adapter for the process
//! lifetime; it is never job-scoped.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// How the delay between retry attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry.
    Constant,
    /// Delay multiplied by `multiplier` after each failure.
    Exponential { multiplier: f64 },
}

/// Retry policy for one provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential { multiplier: 2.0 },
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before attempt number `attempt` (1-based retry index).
    ///
    /// Clamped to [`max_delay`](Self::max_delay). Attempt 0 (the first
    /// call) has no delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = match self.backoff {
            BackoffKind::Constant => self.initial_delay,
            BackoffKind::Exponential { multiplier } => {
                let scaled = self.initial_delay.as_millis() as f64
                    * multiplier.powi(attempt.saturating_sub(1) as i32);
                Duration::from_millis(scaled as u64)
            }
        };
        delay.min(self.max_delay)
    }
}

// ---------------------------------------------------------------------------
// Circuit breaker / bulkhead
// ---------------------------------------------------------------------------

/// Circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub enabled: bool,
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Cooldown after opening before half-open probing begins.
    pub half_open_after: Duration,
    /// Consecutive half-open successes required to close again.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            half_open_after: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Bulkhead (concurrency limit) tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadConfig {
    pub enabled: bool,
    /// Calls allowed to execute simultaneously.
    pub max_concurrent: u32,
    /// Calls allowed to wait for a slot; beyond this, reject.
    pub max_queued: u32,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent: 8,
            max_queued: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// ResilienceConfig
// ---------------------------------------------------------------------------

/// Full resilience policy for one adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub breaker: BreakerConfig,
    pub bulkhead: BulkheadConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            breaker: BreakerConfig::default(),
            bulkhead: BulkheadConfig::default(),
        }
    }
}

impl ResilienceConfig {
    /// Policy suited to unit tests: tiny delays, no cooldowns to wait out.
    pub fn fast_for_tests() -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: BackoffKind::Constant,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
            timeout: Duration::from_millis(250),
            breaker: BreakerConfig {
                enabled: true,
                failure_threshold: 5,
                half_open_after: Duration::from_millis(20),
                success_threshold: 2,
            },
            bulkhead: BulkheadConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- delay_for_attempt ----------------------------------------------------

    #[test]
    fn first_attempt_has_no_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn constant_backoff_repeats_initial_delay() {
        let policy = RetryPolicy {
            backoff: BackoffKind::Constant,
            initial_delay: Duration::from_millis(200),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(200));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy {
            backoff: BackoffKind::Exponential { multiplier: 2.0 },
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn exponential_backoff_clamps_at_max() {
        let policy = RetryPolicy {
            backoff: BackoffKind::Exponential { multiplier: 2.0 },
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(250));
    }

    #[test]
    fn custom_multiplier() {
        let policy = RetryPolicy {
            backoff: BackoffKind::Exponential { multiplier: 3.0 },
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(90));
    }
}
