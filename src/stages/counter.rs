//! # Resource counter (external, read-only to the controller).
//!
//! The controller reads the counter in the idle state and the watchdog reads it
//! while a cycle runs. Neither writes it; consistency is the store's job.
//!
//! ## Staleness
//! The watchdog stops the producer only after the counter *shows* the overshoot.
//! With a store that lags commits by `S`, items committed at rate `R`, and a
//! maximum poll interval `P`, the pool can grow past the threshold by roughly
//! `R × (S + P)` plus whatever is already queued or being validated.
//! Choose `upper_limit_ratio` so that headroom covers this bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::StageError;

/// Source of the current number of valid resources.
///
/// Implementations must be eventually consistent and should document their
/// staleness bound (see the module docs).
#[async_trait]
pub trait ResourceCounter: Send + Sync + 'static {
    /// Returns the current pool size.
    ///
    /// [`StageError::Fail`] is treated as a transient outage; [`StageError::Fatal`]
    /// fails the running cycle.
    async fn count(&self) -> Result<u64, StageError>;
}

/// Shared handle to a counter.
pub type CounterRef = Arc<dyn ResourceCounter>;

/// In-process counter backed by an atomic; reads are always fresh.
///
/// Useful for single-process pools where the validator persists into memory,
/// and for tests.
#[derive(Clone, Debug, Default)]
pub struct AtomicCounter {
    value: Arc<AtomicU64>,
}

impl AtomicCounter {
    /// Creates a counter starting at `value`.
    pub fn new(value: u64) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(value)),
        }
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Overwrites the value.
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    /// Adds `n` and returns the new value.
    pub fn add(&self, n: u64) -> u64 {
        self.value.fetch_add(n, Ordering::AcqRel) + n
    }

    /// Subtracts `n` (saturating at zero) and returns the new value.
    pub fn sub(&self, n: u64) -> u64 {
        let prev = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(n))
            })
            .unwrap_or_else(|v| v);
        prev.saturating_sub(n)
    }
}

#[async_trait]
impl ResourceCounter for AtomicCounter {
    async fn count(&self) -> Result<u64, StageError> {
        Ok(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_the_value() {
        let counter = AtomicCounter::new(5);
        let other = counter.clone();
        assert_eq!(other.add(3), 8);
        assert_eq!(counter.sub(10), 0);
        assert_eq!(counter.count().await, Ok(0));
    }
}
