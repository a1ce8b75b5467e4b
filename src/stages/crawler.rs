//! # Producer adapter around an external crawler.
//!
//! [`Producer`] owns a [`Crawler`] and a stop latch. One call to
//! [`Producer::start`] is one crawl pass: the crawler hands every candidate to a
//! [`Sink`], which puts it on the cycle's queue.
//!
//! ## Stop protocol
//! ```text
//! Watchdog ── StopHandle::stop() ──► latch cancelled
//!                                       │
//! Crawler  ── sink.is_stopped()? ◄──────┤  (checked between sources)
//!          ── sink.put(item)     ◄──────┘  (refused only while waiting for capacity)
//! ```
//! - Stop is advisory: items already in hand may still be put if there is room.
//! - A put blocked on backpressure returns [`QueueError::Stopped`](crate::QueueError::Stopped),
//!   which converts into [`StageError::Canceled`] and ends the pass gracefully.
//! - [`Producer::reset`] installs a fresh latch and resets crawler state; it is idempotent.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::CycleCounters;
use crate::error::{QueueError, StageError};
use crate::primitives::CompletionQueue;

/// External crawler: discovers candidate resources.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use poolvisor::{Crawler, Sink, StageError};
///
/// struct StaticList(Vec<String>);
///
/// #[async_trait]
/// impl Crawler for StaticList {
///     type Item = String;
///
///     async fn crawl(&self, sink: &Sink<String>) -> Result<(), StageError> {
///         for proxy in &self.0 {
///             if sink.is_stopped() {
///                 break;
///             }
///             sink.put(proxy.clone()).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Crawler: Send + Sync + 'static {
    /// Candidate type handed to the validator.
    type Item: Send + 'static;

    /// Stable, human-readable name.
    fn name(&self) -> &str {
        "crawler"
    }

    /// Runs one pass until the sources are exhausted or `sink.is_stopped()`.
    async fn crawl(&self, sink: &Sink<Self::Item>) -> Result<(), StageError>;

    /// Returns crawler-internal state (cursors, visited sets) to its initial value.
    ///
    /// Must be idempotent.
    fn reset(&self) {}
}

/// Stop request handle given to the watchdog. Cheap to clone.
#[derive(Clone, Debug)]
pub struct StopHandle {
    latch: CancellationToken,
}

impl StopHandle {
    /// Requests the producer to stop; idempotent and non-blocking.
    pub fn stop(&self) {
        self.latch.cancel();
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.latch.is_cancelled()
    }
}

/// Where a crawler delivers candidates during one pass.
pub struct Sink<T> {
    queue: CompletionQueue<T>,
    stop: CancellationToken,
    counters: Arc<CycleCounters>,
}

impl<T> Sink<T> {
    /// Puts a candidate on the queue.
    ///
    /// Waits for capacity on a bounded queue, unless a stop is requested while
    /// waiting, in which case the item is dropped and [`QueueError::Stopped`] returned.
    pub async fn put(&self, item: T) -> Result<(), QueueError> {
        let res = tokio::select! {
            biased;
            res = self.queue.put(item) => res,
            _ = self.stop.cancelled() => Err(QueueError::Stopped),
        };
        if res.is_ok() {
            self.counters.record_produced();
        }
        res
    }

    /// Whether the crawler should wind down.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Completes once a stop is requested.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }
}

/// Adapter running a [`Crawler`] against a cycle's queue.
pub struct Producer<C> {
    crawler: C,
    latch: Mutex<CancellationToken>,
}

impl<C: Crawler> Producer<C> {
    /// Wraps a crawler in the ready (not stopped) state.
    pub fn new(crawler: C) -> Self {
        Self {
            crawler,
            latch: Mutex::new(CancellationToken::new()),
        }
    }

    /// The wrapped crawler.
    pub fn crawler(&self) -> &C {
        &self.crawler
    }

    /// Runs one crawl pass. Returns once sources are exhausted or a stop is honored.
    ///
    /// Returns immediately if a stop was requested and not yet [`reset`](Self::reset).
    pub async fn start(
        &self,
        queue: &CompletionQueue<C::Item>,
        counters: &Arc<CycleCounters>,
    ) -> Result<(), StageError> {
        let stop = self.latch();
        if stop.is_cancelled() {
            return Ok(());
        }
        let sink = Sink {
            queue: queue.clone(),
            stop,
            counters: Arc::clone(counters),
        };
        match self.crawler.crawl(&sink).await {
            Ok(()) | Err(StageError::Canceled) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Requests the running (or next) pass to stop.
    pub fn stop(&self) {
        self.latch().cancel();
    }

    /// Whether a stop is pending.
    pub fn is_stopped(&self) -> bool {
        self.latch().is_cancelled()
    }

    /// Handle the watchdog uses to request a stop of the current pass.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            latch: self.latch(),
        }
    }

    /// Clears any stop request and resets the crawler for the next cycle.
    pub fn reset(&self) {
        *self.latch.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
        self.crawler.reset();
    }

    fn latch(&self) -> CancellationToken {
        self.latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
