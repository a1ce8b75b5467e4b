//! # Events emitted by the pool controller and its stages.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Admission**: idle-state counter checks
//! - **Cycle lifecycle**: start, drain, finish, failure, producer reset
//! - **Stage activity**: watchdog polls/trips, per-item validation outcomes
//! - **Runtime**: shutdown and subscriber health
//!
//! The [`Event`] struct carries optional metadata (cycle number, counter value,
//! threshold, stage name, reason, delay) depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use poolvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WatchdogTripped)
//!     .with_cycle(3)
//!     .with_count(95)
//!     .with_threshold(90);
//!
//! assert_eq!(ev.kind, EventKind::WatchdogTripped);
//! assert_eq!(ev.count, Some(95));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission ===
    /// Idle-state counter check.
    ///
    /// Sets: `count`, `threshold` (the lower limit).
    IdleCheck,

    /// Counter could not be read.
    ///
    /// Sets: `stage` (`controller` or `watchdog`), `reason`, `cycle` (watchdog only).
    CounterUnavailable,

    // === Cycle lifecycle ===
    /// A refill cycle is starting.
    ///
    /// Sets: `cycle`.
    CycleStarted,

    /// Every item put during the cycle has been marked done.
    ///
    /// Sets: `cycle`.
    QueueDrained,

    /// Cycle ended and was torn down cleanly.
    ///
    /// Sets: `cycle`, `reason` (tallies), `delay_ms` (elapsed).
    CycleFinished,

    /// Cycle ended because a stage failed.
    ///
    /// Sets: `cycle`, `stage` (error label), `reason`.
    CycleFailed,

    /// Producer state was reset for the next cycle.
    ///
    /// Sets: `cycle` (the cycle that just ended).
    ProducerReset,

    // === Stage activity ===
    /// Watchdog read the counter and found it under the threshold.
    ///
    /// Sets: `cycle`, `count`, `threshold`.
    WatchdogPolled,

    /// Watchdog found the counter above the threshold and stopped the producer.
    ///
    /// Sets: `cycle`, `count`, `threshold`.
    WatchdogTripped,

    /// Validator rejected an item.
    ///
    /// Sets: `cycle`, `stage` (validator name).
    ItemRejected,

    /// Validator failed on an item with a retryable error.
    ///
    /// Sets: `cycle`, `stage` (validator name), `reason`.
    ItemFailed,

    // === Runtime ===
    /// Shutdown requested (token cancelled or OS signal observed).
    ShutdownRequested,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `stage` (subscriber name), `reason`.
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `stage` (subscriber name), `reason` (panic message).
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Cycle number (starting from 1).
    pub cycle: Option<u64>,
    /// Counter value observed.
    pub count: Option<u64>,
    /// Threshold the count was compared against.
    pub threshold: Option<u64>,
    /// Stage, subscriber or error label the event refers to.
    pub stage: Option<Arc<str>>,
    /// Human-readable reason (errors, tallies, overflow details).
    pub reason: Option<Arc<str>>,
    /// Duration in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            cycle: None,
            count: None,
            threshold: None,
            stage: None,
            reason: None,
            delay_ms: None,
        }
    }

    /// Attaches a cycle number.
    #[inline]
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Attaches an observed counter value.
    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a threshold.
    #[inline]
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Attaches a stage name.
    #[inline]
    pub fn with_stage(mut self, stage: impl Into<Arc<str>>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a duration (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_stage(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_stage(subscriber)
            .with_reason(info)
    }
}
