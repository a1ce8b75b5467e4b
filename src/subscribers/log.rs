//! # LogWriter: renders events through `tracing`.
//!
//! Levels:
//! - `debug`: idle checks, watchdog polls, rejected items, drains, producer resets
//! - `info`: cycle start/finish, shutdown
//! - `warn`: watchdog trips, counter outages, failed items, subscriber overflow
//! - `error`: cycle failures, subscriber panics
//!
//! Install a `tracing` subscriber (see [`init_tracing`](crate::init_tracing))
//! to see the output.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event subscriber that forwards every event to `tracing`.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let stage = e.stage.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::IdleCheck => {
                debug!(count = ?e.count, lower_limit = ?e.threshold, "checked pool size");
            }
            EventKind::CounterUnavailable => {
                warn!(cycle = ?e.cycle, stage, reason, "resource counter unavailable");
            }
            EventKind::CycleStarted => {
                info!(cycle = ?e.cycle, "extend pool started");
            }
            EventKind::WatchdogPolled => {
                debug!(cycle = ?e.cycle, count = ?e.count, threshold = ?e.threshold, "checked pool size");
            }
            EventKind::WatchdogTripped => {
                warn!(
                    cycle = ?e.cycle,
                    count = ?e.count,
                    threshold = ?e.threshold,
                    "pool size approached the upper limit; stopping producer"
                );
            }
            EventKind::ItemRejected => {
                debug!(cycle = ?e.cycle, validator = stage, "candidate rejected");
            }
            EventKind::ItemFailed => {
                warn!(cycle = ?e.cycle, validator = stage, reason, "candidate validation failed");
            }
            EventKind::QueueDrained => {
                debug!(cycle = ?e.cycle, "queue drained");
            }
            EventKind::CycleFinished => {
                info!(cycle = ?e.cycle, elapsed_ms = ?e.delay_ms, tally = reason, "extend pool finished");
            }
            EventKind::CycleFailed => {
                error!(cycle = ?e.cycle, label = stage, reason, "extend pool failed");
            }
            EventKind::ProducerReset => {
                debug!(cycle = ?e.cycle, "producer reset");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = stage, reason, "subscriber dropped an event");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = stage, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
