//! # Per-cycle bookkeeping.
//!
//! [`CycleCounters`] is shared by the sink and the consumer loops while a cycle
//! runs; [`CycleReport`] is what the controller hands back when it is over.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::core::watchdog::WatchdogExit;
use crate::error::CycleError;

/// Live tallies for one cycle.
#[derive(Debug, Default)]
pub struct CycleCounters {
    produced: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl CycleCounters {
    pub(crate) fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the tallies.
    pub fn snapshot(&self) -> CycleStats {
        CycleStats {
            produced: self.produced.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Tallies of one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Items put on the queue.
    pub produced: u64,
    /// Items the validator accepted.
    pub accepted: u64,
    /// Items the validator rejected.
    pub rejected: u64,
    /// Items whose validation errored.
    pub failed: u64,
}

impl CycleStats {
    /// Items that went through the validator, whatever the outcome.
    pub fn processed(&self) -> u64 {
        self.accepted + self.rejected + self.failed
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "produced={} accepted={} rejected={} failed={}",
            self.produced, self.accepted, self.rejected, self.failed
        )
    }
}

/// How a cycle that did not fail came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleEnd {
    /// Producer finished (exhausted or stopped) and every item was marked done.
    Drained,
    /// Shutdown was requested mid-cycle.
    Interrupted,
}

/// Summary of one cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// Cycle number, starting from 1.
    pub cycle: u64,
    /// Final tallies.
    pub stats: CycleStats,
    /// How the watchdog exited (`None` if it failed or was lost).
    pub watchdog: Option<WatchdogExit>,
    /// Wall time from spawn to teardown.
    pub elapsed: Duration,
    /// End state or the first failure observed.
    pub outcome: Result<CycleEnd, CycleError>,
}

impl CycleReport {
    /// Whether the watchdog stopped the producer during this cycle.
    pub fn stopped_by_watchdog(&self) -> bool {
        matches!(self.watchdog, Some(WatchdogExit::Tripped { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_counts_every_outcome() {
        let counters = CycleCounters::default();
        for _ in 0..4 {
            counters.record_produced();
        }
        counters.record_accepted();
        counters.record_accepted();
        counters.record_rejected();
        counters.record_failed();

        let stats = counters.snapshot();
        assert_eq!(stats.processed(), stats.produced);
        assert_eq!(
            stats.to_string(),
            "produced=4 accepted=2 rejected=1 failed=1"
        );
    }
}
