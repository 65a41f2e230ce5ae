//! Circuit breaker shared by every in-flight call through one adapter.
//!
//! State lives behind a [`parking_lot::RwLock`] plus atomic counters;
//! neither is ever held across an await point. One breaker exists per
//! (adapter, process) lifetime.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::BreakerConfig;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation.
    #[serde(rename = "closed")]
    Closed,
    /// Failing; calls short-circuit without invoking the operation.
    #[serde(rename = "open")]
    Open,
    /// Cooldown elapsed; trial calls decide whether to close or re-open.
    #[serde(rename = "halfOpen")]
    HalfOpen,
}

impl CircuitState {
    /// Stable string form used in logs and payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "halfOpen",
        }
    }
}

/// Consecutive-failure circuit breaker.
///
/// - `failure_threshold` consecutive failures open the breaker.
/// - After `half_open_after`, the next permitted call probes half-open.
/// - `success_threshold` consecutive half-open successes close it.
/// - A single half-open failure re-opens it.
///
/// A breaker built from a config with `enabled: false` always permits
/// calls and reports `Closed`.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: RwLock<CircuitState>,
    opened_at: RwLock<Option<Instant>>,
    consecutive_failures: AtomicU32,
    half_open_successes: AtomicU32,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            opened_at: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
        }
    }

    /// Current state, after applying the open → half-open cooldown
    /// transition if it is due.
    pub fn state(&self) -> CircuitState {
        if !self.config.enabled {
            return CircuitState::Closed;
        }
        self.check_cooldown();
        *self.state.read()
    }

    /// Whether a call may proceed right now.
    pub fn is_call_permitted(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        }
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        let state = *self.state.read();
        match state {
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    *self.state.write() = CircuitState::Closed;
                    *self.opened_at.write() = None;
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    self.half_open_successes.store(0, Ordering::SeqCst);
                    tracing::info!("Circuit breaker closed after successful recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed operation.
    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        let state = *self.state.read();
        match state {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.open();
                    tracing::warn!(
                        consecutive_failures = failures,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // One bad probe is enough to re-open.
                self.open();
                tracing::warn!("Circuit breaker re-opened from half-open");
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self) {
        *self.state.write() = CircuitState::Open;
        *self.opened_at.write() = Some(Instant::now());
        self.half_open_successes.store(0, Ordering::SeqCst);
    }

    /// Transition open → half-open once the cooldown has elapsed.
    fn check_cooldown(&self) {
        if *self.state.read() != CircuitState::Open {
            return;
        }
        let due = self
            .opened_at
            .read()
            .map(|at| at.elapsed() >= self.config.half_open_after)
            .unwrap_or(false);
        if due {
            let mut state = self.state.write();
            // Re-check under the write lock; another caller may have won.
            if *state == CircuitState::Open {
                *state = CircuitState::HalfOpen;
                self.half_open_successes.store(0, Ordering::SeqCst);
                tracing::debug!("Circuit breaker half-open, probing");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
