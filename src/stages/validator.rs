//! # Consumer adapter around an external validator.
//!
//! [`Consumer::start`] runs `workers` identical loops over the cycle's queue:
//!
//! ```text
//! loop {
//!   ├─► get()             (cancellable; nothing consumed if cancelled here)
//!   ├─► validate(item)    (cancellable; item abandoned, NOT marked done)
//!   ├─► mark_done()       (exactly once per validated item)
//!   └─► Accepted / Rejected / Fail → continue,  Fatal → return Err
//! }
//! ```
//!
//! The loops have no notion of "end of work": they return only when the
//! controller cancels them or closes the queue, which is not an error.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::core::CycleCounters;
use crate::error::StageError;
use crate::events::{Bus, Event, EventKind};
use crate::primitives::CompletionQueue;

/// Outcome of validating one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Candidate is usable and was persisted.
    Accepted,
    /// Candidate is unusable and was discarded.
    Rejected,
}

/// External validator: tests a candidate and persists it when valid.
#[async_trait]
pub trait Validator: Send + Sync + 'static {
    /// Candidate type; must match the crawler's.
    type Item: Send + 'static;

    /// Stable, human-readable name.
    fn name(&self) -> &str {
        "validator"
    }

    /// Validates and persists one candidate.
    ///
    /// [`StageError::Fail`] is logged and the loop continues; [`StageError::Fatal`]
    /// ends the consumer and fails the cycle.
    async fn validate(&self, item: Self::Item) -> Result<Verdict, StageError>;
}

/// Adapter draining a cycle's queue through a [`Validator`].
pub struct Consumer<V> {
    validator: Arc<V>,
    workers: usize,
    bus: Bus,
}

impl<V: Validator> Consumer<V> {
    /// Creates a consumer running `workers` loops (at least 1).
    pub fn new(validator: V, workers: usize, bus: Bus) -> Self {
        Self {
            validator: Arc::new(validator),
            workers: workers.max(1),
            bus,
        }
    }

    /// The wrapped validator.
    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Runs until `token` is cancelled or the queue is closed.
    pub async fn start(
        &self,
        queue: CompletionQueue<V::Item>,
        token: CancellationToken,
        counters: Arc<CycleCounters>,
        cycle: u64,
    ) -> Result<(), StageError> {
        let loops = (0..self.workers).map(|_| self.work(&queue, &token, &counters, cycle));
        try_join_all(loops).await.map(|_| ())
    }

    async fn work(
        &self,
        queue: &CompletionQueue<V::Item>,
        token: &CancellationToken,
        counters: &CycleCounters,
        cycle: u64,
    ) -> Result<(), StageError> {
        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                got = queue.get() => match got {
                    Ok(item) => item,
                    Err(_closed) => return Ok(()),
                },
            };

            let verdict = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                verdict = self.validator.validate(item) => verdict,
            };

            queue.mark_done().map_err(StageError::from)?;

            match verdict {
                Ok(Verdict::Accepted) => counters.record_accepted(),
                Ok(Verdict::Rejected) => {
                    counters.record_rejected();
                    self.bus.publish(
                        Event::new(EventKind::ItemRejected)
                            .with_cycle(cycle)
                            .with_stage(self.validator.name()),
                    );
                }
                Err(StageError::Canceled) => return Ok(()),
                Err(e) if e.is_retryable() => {
                    counters.record_failed();
                    self.bus.publish(
                        Event::new(EventKind::ItemFailed)
                            .with_cycle(cycle)
                            .with_stage(self.validator.name())
                            .with_reason(e.to_string()),
                    );
                }
                Err(e) => {
                    counters.record_failed();
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedValidator;
    use std::time::Duration;
    use tokio::time::timeout;

    fn consumer(validator: ScriptedValidator, workers: usize) -> Arc<Consumer<ScriptedValidator>> {
        Arc::new(Consumer::new(validator, workers, Bus::new(64)))
    }

    fn spawn(
        consumer: &Arc<Consumer<ScriptedValidator>>,
        queue: &CompletionQueue<u32>,
        token: &CancellationToken,
        counters: &Arc<CycleCounters>,
    ) -> tokio::task::JoinHandle<Result<(), StageError>> {
        let (c, q, t, n) = (
            Arc::clone(consumer),
            queue.clone(),
            token.clone(),
            Arc::clone(counters),
        );
        tokio::spawn(async move { c.start(q, t, n, 1).await })
    }

    #[tokio::test]
    async fn every_item_is_marked_done_once() {
        let queue = CompletionQueue::unbounded();
        let token = CancellationToken::new();
        let counters = Arc::new(CycleCounters::default());
        let consumer = consumer(ScriptedValidator::accept_all(), 3);
        let task = spawn(&consumer, &queue, &token, &counters);

        for i in 0..20 {
            queue.put(i).await.unwrap();
        }
        timeout(Duration::from_secs(1), queue.join()).await.unwrap();

        assert_eq!(queue.unfinished(), 0);
        assert_eq!(consumer.validator().seen(), 20);
        assert_eq!(counters.snapshot().accepted, 20);

        token.cancel();
        assert_eq!(task.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn cancel_while_blocked_on_empty_queue_is_clean() {
        let queue: CompletionQueue<u32> = CompletionQueue::unbounded();
        let token = CancellationToken::new();
        let counters = Arc::new(CycleCounters::default());
        let task = spawn(&consumer(ScriptedValidator::accept_all(), 2), &queue, &token, &counters);

        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();

        assert_eq!(task.await.unwrap(), Ok(()));
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn rejections_and_soft_failures_keep_the_loop_running() {
        let queue = CompletionQueue::unbounded();
        let token = CancellationToken::new();
        let counters = Arc::new(CycleCounters::default());
        // even ids rejected, multiples of 5 fail softly
        let consumer = consumer(ScriptedValidator::accept_all().reject_even().fail_on(5), 1);
        let task = spawn(&consumer, &queue, &token, &counters);

        for i in 1..=6 {
            queue.put(i).await.unwrap();
        }
        timeout(Duration::from_secs(1), queue.join()).await.unwrap();
        token.cancel();
        task.await.unwrap().unwrap();

        let stats = counters.snapshot();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 3);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn fatal_error_ends_the_consumer_after_marking_done() {
        let queue = CompletionQueue::unbounded();
        let token = CancellationToken::new();
        let counters = Arc::new(CycleCounters::default());
        let task = spawn(
            &consumer(ScriptedValidator::accept_all().fatal_on(2), 1),
            &queue,
            &token,
            &counters,
        );

        queue.put(1).await.unwrap();
        queue.put(2).await.unwrap();
        queue.put(3).await.unwrap();

        let res = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(matches!(res, Err(StageError::Fatal { .. })));
        assert_eq!(queue.unfinished(), 1);
    }
}
