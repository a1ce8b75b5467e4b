//! # Watchdog: stops the producer before the pool overshoots.
//!
//! ```text
//! loop {
//!   ├─► count()  ── > threshold ──► StopHandle::stop(), exit Tripped
//!   │            ── Fail         ──► CounterUnavailable, keep polling
//!   │            ── Fatal        ──► exit Err
//!   ├─► flag set? ───────────────► exit Completed
//!   └─► sleep(jitter(max_interval))   (woken early by the flag)
//! }
//! ```
//!
//! The counter only reflects committed validations, so the threshold sits at
//! `upper_limit × upper_limit_ratio` to leave room for work still in flight.
//! The stop request is fire-and-forget: the watchdog does not wait for the
//! producer to honor it.

use std::time::Duration;

use crate::error::StageError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::JitterPolicy;
use crate::primitives::CompletionFlag;
use crate::stages::{CounterRef, StopHandle};

/// Why the watchdog exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogExit {
    /// Counter exceeded the threshold; producer stop requested.
    Tripped {
        /// Counter value that crossed the threshold.
        count: u64,
    },
    /// Completion flag was set; the cycle ended on its own.
    Completed,
}

/// Polls the counter for one cycle.
pub struct Watchdog {
    counter: CounterRef,
    threshold: u64,
    max_interval: Duration,
    jitter: JitterPolicy,
    bus: Bus,
    cycle: u64,
}

impl Watchdog {
    /// Creates a watchdog tripping when `count > threshold`.
    pub fn new(counter: CounterRef, threshold: u64, max_interval: Duration, bus: Bus) -> Self {
        Self {
            counter,
            threshold,
            max_interval,
            jitter: JitterPolicy::Full,
            bus,
            cycle: 0,
        }
    }

    /// Overrides the interval randomization (full jitter by default).
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Tags published events with a cycle number.
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = cycle;
        self
    }

    /// Runs until the threshold trips, the flag is set, or the counter fails fatally.
    pub async fn run(
        self,
        stop: StopHandle,
        flag: CompletionFlag,
    ) -> Result<WatchdogExit, StageError> {
        loop {
            let read = tokio::select! {
                biased;
                _ = flag.wait() => return Ok(WatchdogExit::Completed),
                read = self.counter.count() => read,
            };

            match read {
                Ok(count) if count > self.threshold => {
                    stop.stop();
                    self.publish(EventKind::WatchdogTripped, count);
                    return Ok(WatchdogExit::Tripped { count });
                }
                Ok(count) => self.publish(EventKind::WatchdogPolled, count),
                Err(e) if e.is_retryable() => {
                    self.bus.publish(
                        Event::new(EventKind::CounterUnavailable)
                            .with_cycle(self.cycle)
                            .with_stage("watchdog")
                            .with_reason(e.to_string()),
                    );
                }
                Err(e) => return Err(e),
            }

            if flag.is_set() {
                return Ok(WatchdogExit::Completed);
            }

            let nap = self.jitter.apply(self.max_interval);
            tokio::select! {
                biased;
                _ = flag.wait() => return Ok(WatchdogExit::Completed),
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }

    fn publish(&self, kind: EventKind, count: u64) {
        self.bus.publish(
            Event::new(kind)
                .with_cycle(self.cycle)
                .with_count(count)
                .with_threshold(self.threshold),
        );
    }
}
