//! Bulkhead concurrency limiting for one adapter.
//!
//! At most `max_concurrent` calls execute at once; up to `max_queued`
//! more may wait for a slot. Anything beyond that is rejected
//! immediately — the bulkhead never queues without bound.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::BulkheadConfig;
use crate::error::ProviderError;

/// Admission control for concurrent calls through one adapter.
pub struct Bulkhead {
    provider: String,
    semaphore: Arc<Semaphore>,
    /// Running + queued calls.
    in_flight: Arc<AtomicU32>,
    /// `max_concurrent + max_queued`.
    capacity: u32,
}

/// Held for the duration of one admitted call.
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicU32>,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Bulkhead {
    pub fn new(provider: impl Into<String>, config: &BulkheadConfig) -> Self {
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent as usize)),
            in_flight: Arc::new(AtomicU32::new(0)),
            capacity: config.max_concurrent + config.max_queued,
        }
    }

    /// Admit a call, waiting for an execution slot if the queue has room.
    ///
    /// Returns [`ProviderError::BulkheadFull`] without waiting when
    /// running + queued calls already fill the capacity.
    pub async fn acquire(&self) -> Result<BulkheadPermit, ProviderError> {
        let count = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.capacity {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::BulkheadFull(self.provider.clone()));
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            // The semaphore is never closed while the bulkhead lives.
            .expect("bulkhead semaphore closed");

        Ok(BulkheadPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Running + queued calls right now.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
