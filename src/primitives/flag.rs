//! # One-shot completion latch.
//!
//! [`CompletionFlag`] starts unset and can only move to set. The controller sets
//! it once the cycle's queue has drained; the watchdog observes it between polls
//! and while sleeping.
//!
//! Backed by a [`CancellationToken`], so `wait` is woken by `set` without polling.

use tokio_util::sync::CancellationToken;

/// One-shot, observable boolean latch.
///
/// Clones observe the same latch. Setting is idempotent.
#[derive(Clone, Debug, Default)]
pub struct CompletionFlag {
    latch: CancellationToken,
}

impl CompletionFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter.
    pub fn set(&self) {
        self.latch.cancel();
    }

    /// Whether the flag has been set.
    pub fn is_set(&self) -> bool {
        self.latch.is_cancelled()
    }

    /// Completes once the flag is set (immediately if it already is).
    pub async fn wait(&self) {
        self.latch.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_unset_and_latches() {
        let flag = CompletionFlag::new();
        assert!(!flag.is_set());
        flag.set();
        flag.set();
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn set_wakes_waiter_on_a_clone() {
        let flag = CompletionFlag::new();
        let observer = flag.clone();
        let waiter = tokio::spawn(async move { observer.wait().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        flag.set();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
