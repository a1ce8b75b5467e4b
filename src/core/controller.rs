//! # PoolController: admission loop and cycle orchestration.
//!
//! ## State machine
//! ```text
//!            count >= lower_limit (or counter unavailable)
//!           ┌──────────────┐
//!           ▼              │ sleep(check_cycle_time)
//!        ┌──────┐──────────┘
//!        │ Idle │
//!        └──┬───┘◄─────────────────────────────────────────────┐
//!           │ count < lower_limit                              │
//!           ▼                                                  │
//!     ┌───────────┐  teardown  ┌──────────────────────────┐    │
//!     │  Cycling  │───────────►│ sleep(check_interval_time)│───┘
//!     └───────────┘            │ producer.reset()          │
//!                              └──────────────────────────┘
//! ```
//!
//! ## One cycle
//! ```text
//! spawn Consumer::start(queue, token)        spawn Watchdog::run(stop_handle, flag)
//!          │                                           │
//! inline:  Producer::start(queue) ─► queue.join()      │ (may call stop_handle.stop())
//!          │                                           │
//!          └── first of: drained | producer error | consumer exit | watchdog error | shutdown
//!                 │
//! teardown:  token.cancel()  ─► consumer returns
//!            flag.set()      ─► watchdog returns
//!            queue.close()
//!            await consumer, await watchdog
//! ```
//!
//! ## Rules
//! - Only the controller cancels the consumer, and only after `join()` returned
//!   or the cycle already failed; never on a queue-emptiness heuristic.
//! - Every task spawned for a cycle is awaited before the cycle returns.
//! - Failures and panics of any stage end the cycle and are reported; the loop
//!   itself only ends when the shutdown token is cancelled.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::PoolConfig;
use crate::core::{
    CycleCounters, CycleEnd, CycleReport,
    shutdown,
    watchdog::{Watchdog, WatchdogExit},
};
use crate::error::{CycleError, StageError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::JitterPolicy;
use crate::primitives::{CompletionFlag, CompletionQueue};
use crate::stages::{Consumer, CounterRef, Crawler, Producer, Validator};
use crate::subscribers::panic_message;

/// Result of an idle-state counter check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Pool is below `lower_limit`: start a cycle.
    Refill {
        /// Observed counter value.
        count: u64,
    },
    /// Pool is large enough: stay idle.
    Hold {
        /// Observed counter value.
        count: u64,
    },
    /// Counter could not be read: stay idle.
    Unavailable,
}

/// Keeps the pool inside `[lower_limit, upper_limit]` by running refill cycles.
///
/// Built with [`PoolController::builder`].
pub struct PoolController<C, V> {
    pub(super) cfg: PoolConfig,
    pub(super) counter: CounterRef,
    pub(super) producer: Producer<C>,
    pub(super) consumer: Arc<Consumer<V>>,
    pub(super) bus: Bus,
    pub(super) jitter: JitterPolicy,
    pub(super) cycles: AtomicU64,
    /// Stops the subscriber listener when the controller is dropped.
    pub(super) _listener: Option<DropGuard>,
}

impl<C, V> PoolController<C, V>
where
    C: Crawler,
    V: Validator<Item = C::Item>,
{
    /// Runs the admission loop until `shutdown` is cancelled.
    ///
    /// Never returns on its own: cycle failures are reported on the bus and
    /// the loop carries on.
    pub async fn run(&self, shutdown: CancellationToken) {
        while !shutdown.is_cancelled() {
            let admission = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                admission = self.check() => admission,
            };
            if !matches!(admission, Admission::Refill { .. }) {
                if !pause(self.cfg.check_cycle_time, &shutdown).await {
                    break;
                }
                continue;
            }

            let report = self.run_cycle(&shutdown).await;

            if !pause(self.cfg.check_interval_time, &shutdown).await {
                break;
            }
            self.producer.reset();
            self.bus
                .publish(Event::new(EventKind::ProducerReset).with_cycle(report.cycle));
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
    }

    /// Runs the admission loop until SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
    ///
    /// Returns `Err` only if signal handlers cannot be installed; the loop is
    /// wound down cleanly in that case too.
    pub async fn run_until_signal(&self) -> std::io::Result<()> {
        let token = CancellationToken::new();
        let run = self.run(token.clone());
        tokio::pin!(run);

        let signal = tokio::select! {
            _ = &mut run => return Ok(()),
            signal = shutdown::wait_for_shutdown_signal() => signal,
        };
        token.cancel();
        run.await;
        signal
    }

    /// Reads the counter and decides whether a cycle is needed.
    pub async fn check(&self) -> Admission {
        match self.counter.count().await {
            Ok(count) => {
                self.bus.publish(
                    Event::new(EventKind::IdleCheck)
                        .with_count(count)
                        .with_threshold(self.cfg.lower_limit),
                );
                if count < self.cfg.lower_limit {
                    Admission::Refill { count }
                } else {
                    Admission::Hold { count }
                }
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::CounterUnavailable)
                        .with_stage("controller")
                        .with_reason(e.to_string()),
                );
                Admission::Unavailable
            }
        }
    }

    /// Runs exactly one cycle and tears it down.
    ///
    /// Cancelling `shutdown` interrupts the cycle; teardown still joins every task.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let queue = CompletionQueue::new(self.cfg.queue_bound());
        let flag = CompletionFlag::new();
        let counters = Arc::new(CycleCounters::default());
        let token = shutdown.child_token();

        self.bus
            .publish(Event::new(EventKind::CycleStarted).with_cycle(cycle));

        let mut consumer = {
            let consumer = Arc::clone(&self.consumer);
            let (queue, token, counters) = (queue.clone(), token.clone(), Arc::clone(&counters));
            tokio::spawn(async move { consumer.start(queue, token, counters, cycle).await })
        };
        let mut watchdog = tokio::spawn(
            Watchdog::new(
                Arc::clone(&self.counter),
                self.cfg.overshoot_threshold(),
                self.cfg.watchdog_max_interval,
                self.bus.clone(),
            )
            .with_jitter(self.jitter)
            .with_cycle(cycle)
            .run(self.producer.stop_handle(), flag.clone()),
        );

        let mut drain = Box::pin(
            AssertUnwindSafe(async {
                self.producer.start(&queue, &counters).await?;
                queue.join().await;
                Ok::<(), StageError>(())
            })
            .catch_unwind(),
        );

        let mut consumer_exit: Option<Result<(), CycleError>> = None;
        let mut watchdog_exit: Option<Result<WatchdogExit, CycleError>> = None;

        let ended = loop {
            tokio::select! {
                res = &mut drain => break match res {
                    Ok(Ok(())) => {
                        self.bus.publish(Event::new(EventKind::QueueDrained).with_cycle(cycle));
                        Ok(CycleEnd::Drained)
                    }
                    Ok(Err(e)) => Err(CycleError::Producer(e)),
                    Err(panic) => Err(CycleError::Panicked {
                        stage: "producer",
                        message: panic_message(panic.as_ref()),
                    }),
                },
                res = &mut consumer, if consumer_exit.is_none() => {
                    let res = consumer_result(res);
                    consumer_exit = Some(res.clone());
                    if token.is_cancelled() {
                        break Ok(CycleEnd::Interrupted);
                    }
                    break Err(res.err().unwrap_or(CycleError::ConsumerExited));
                },
                res = &mut watchdog, if watchdog_exit.is_none() => {
                    let res = watchdog_result(res);
                    watchdog_exit = Some(res.clone());
                    if let Err(e) = res {
                        break Err(e);
                    }
                },
                _ = token.cancelled() => break Ok(CycleEnd::Interrupted),
            }
        };

        drop(drain);
        token.cancel();
        flag.set();
        queue.close();

        let consumer_exit = match consumer_exit {
            Some(res) => res,
            None => consumer_result(consumer.await),
        };
        let watchdog_exit = match watchdog_exit {
            Some(res) => res,
            None => watchdog_result(watchdog.await),
        };

        // First failure wins; a stage failing during teardown still fails the cycle.
        let outcome = match ended {
            Err(e) => Err(e),
            Ok(end) => match (&consumer_exit, &watchdog_exit) {
                (Err(e), _) | (_, Err(e)) => Err(e.clone()),
                _ => Ok(end),
            },
        };
        let report = CycleReport {
            cycle,
            stats: counters.snapshot(),
            watchdog: watchdog_exit.ok(),
            elapsed: started.elapsed(),
            outcome,
        };
        self.publish_report(&report);
        report
    }

    /// Event bus; subscribe to observe the controller.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Validated configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// Producer adapter.
    pub fn producer(&self) -> &Producer<C> {
        &self.producer
    }

    /// Consumer adapter.
    pub fn consumer(&self) -> &Consumer<V> {
        &self.consumer
    }

    /// Number of cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    fn publish_report(&self, report: &CycleReport) {
        let ev = match &report.outcome {
            Ok(_) => Event::new(EventKind::CycleFinished)
                .with_cycle(report.cycle)
                .with_reason(report.stats.to_string())
                .with_delay(report.elapsed),
            Err(e) => Event::new(EventKind::CycleFailed)
                .with_cycle(report.cycle)
                .with_stage(e.as_label())
                .with_reason(e.to_string()),
        };
        self.bus.publish(ev);
    }
}

/// Sleeps unless shutdown comes first; `false` means shutdown.
async fn pause(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn consumer_result(res: Result<Result<(), StageError>, JoinError>) -> Result<(), CycleError> {
    joined("consumer", res)?.map_err(CycleError::Consumer)
}

fn watchdog_result(
    res: Result<Result<WatchdogExit, StageError>, JoinError>,
) -> Result<WatchdogExit, CycleError> {
    joined("watchdog", res)?.map_err(CycleError::Watchdog)
}

fn joined<T>(stage: &'static str, res: Result<T, JoinError>) -> Result<T, CycleError> {
    res.map_err(|err| {
        if err.is_panic() {
            CycleError::Panicked {
                stage,
                message: panic_message(err.into_panic().as_ref()),
            }
        } else {
            CycleError::Aborted { stage }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::stages::AtomicCounter;
    use crate::test_support::{
        EndlessCrawler, ListCrawler, Recorder, ScriptedCounter, ScriptedValidator,
    };
    use tokio::sync::broadcast;
    use tokio::time::{sleep, timeout};

    fn cfg() -> PoolConfig {
        PoolConfig {
            lower_limit: 10,
            upper_limit: 100,
            upper_limit_ratio: 0.9,
            watchdog_max_interval: Duration::from_millis(50),
            ..PoolConfig::default()
        }
    }

    fn controller<C: Crawler<Item = u32>>(
        counter: CounterRef,
        crawler: C,
        validator: ScriptedValidator,
    ) -> PoolController<C, ScriptedValidator> {
        PoolController::builder(cfg(), counter, crawler, validator)
            .build()
            .unwrap()
    }

    fn drain_kinds(rx: &mut broadcast::Receiver<Arc<Event>>) -> Vec<EventKind> {
        std::iter::from_fn(|| rx.try_recv().ok().map(|ev| ev.kind)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn check_starts_a_cycle_strictly_below_lower_limit() {
        let counter = Arc::new(ScriptedCounter::new(vec![9, 10, 50]));
        let ctrl = controller(counter, ListCrawler::new(vec![]), ScriptedValidator::accept_all());

        assert_eq!(ctrl.check().await, Admission::Refill { count: 9 });
        assert_eq!(ctrl.check().await, Admission::Hold { count: 10 });
        assert_eq!(ctrl.check().await, Admission::Hold { count: 50 });
    }

    #[tokio::test(start_paused = true)]
    async fn counter_outage_keeps_the_controller_idle() {
        let counter = Arc::new(
            ScriptedCounter::new(vec![50]).fail_first(1, StageError::fail("store unreachable")),
        );
        let ctrl = controller(counter, ListCrawler::new(vec![1]), ScriptedValidator::accept_all());
        let mut rx = ctrl.bus().subscribe();

        assert_eq!(ctrl.check().await, Admission::Unavailable);
        assert_eq!(ctrl.check().await, Admission::Hold { count: 50 });
        assert_eq!(
            drain_kinds(&mut rx),
            vec![EventKind::CounterUnavailable, EventKind::IdleCheck]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_pool_never_crawls() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(50)),
            ListCrawler::new(vec![1, 2, 3]),
            ScriptedValidator::accept_all(),
        );
        let mut rx = ctrl.bus().subscribe();
        let token = CancellationToken::new();

        tokio::join!(ctrl.run(token.clone()), async {
            sleep(Duration::from_secs(125)).await;
            token.cancel();
        });

        assert_eq!(ctrl.producer().crawler().passes(), 0);
        assert_eq!(ctrl.cycles_started(), 0);
        let kinds = drain_kinds(&mut rx);
        // checks at 0s, 30s, 60s, 90s and 120s
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::IdleCheck).count(), 5);
        assert_eq!(kinds.last(), Some(&EventKind::ShutdownRequested));
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_stops_the_producer_and_the_queue_still_drains() {
        let counter = AtomicCounter::new(5);
        let ctrl = controller(
            Arc::new(counter.clone()),
            EndlessCrawler::new(Duration::from_millis(10)),
            ScriptedValidator::accept_all().persist_into(counter.clone(), 30),
        );
        let token = CancellationToken::new();

        assert_eq!(ctrl.check().await, Admission::Refill { count: 5 });
        let report = timeout(Duration::from_secs(60), ctrl.run_cycle(&token))
            .await
            .unwrap();

        assert_eq!(report.outcome, Ok(CycleEnd::Drained));
        assert!(report.stopped_by_watchdog());
        assert!(counter.get() > 90);
        assert_eq!(report.stats.produced, report.stats.processed());
        assert_eq!(report.stats.accepted, report.stats.produced);
        assert!(ctrl.producer().is_stopped());

        ctrl.producer().reset();
        assert!(!ctrl.producer().is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_crawl_finishes_without_hanging() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![]),
            ScriptedValidator::accept_all(),
        );

        let report = timeout(Duration::from_secs(5), ctrl.run_cycle(&CancellationToken::new()))
            .await
            .unwrap();

        assert_eq!(report.outcome, Ok(CycleEnd::Drained));
        assert_eq!(report.stats, Default::default());
        assert_eq!(report.watchdog, Some(WatchdogExit::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn every_item_is_validated_before_the_cycle_ends() {
        let counter = AtomicCounter::new(0);
        let ctrl = controller(
            Arc::new(counter.clone()),
            ListCrawler::new((1..=25).collect()),
            ScriptedValidator::accept_all().reject_even().persist_into(counter.clone(), 1),
        );

        let report = ctrl.run_cycle(&CancellationToken::new()).await;

        assert_eq!(report.outcome, Ok(CycleEnd::Drained));
        assert_eq!(report.stats.produced, 25);
        assert_eq!(report.stats.accepted, 13);
        assert_eq!(report.stats.rejected, 12);
        assert_eq!(ctrl.consumer().validator().seen(), 25);
        assert_eq!(counter.get(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn producer_error_fails_the_cycle() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![1, 2, 3]).fail_at(1, StageError::fail("source down")),
            ScriptedValidator::accept_all(),
        );

        let report = ctrl.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(
            report.outcome,
            Err(CycleError::Producer(StageError::Fail { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn producer_panic_is_reported() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![1, 2]).panic_at(0),
            ScriptedValidator::accept_all(),
        );

        let report = ctrl.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(
            report.outcome,
            Err(CycleError::Panicked { stage: "producer", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_validation_fails_the_cycle() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![1, 2, 3]),
            ScriptedValidator::accept_all().fatal_on(2),
        );
        let mut rx = ctrl.bus().subscribe();

        let report = timeout(Duration::from_secs(5), ctrl.run_cycle(&CancellationToken::new()))
            .await
            .unwrap();

        assert!(matches!(
            report.outcome,
            Err(CycleError::Consumer(StageError::Fatal { .. }))
        ));
        assert_eq!(report.stats.accepted, 1);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(drain_kinds(&mut rx).last(), Some(&EventKind::CycleFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_panic_is_reported() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![1, 2, 3]),
            ScriptedValidator::accept_all().panic_on(3),
        );

        let report = timeout(Duration::from_secs(5), ctrl.run_cycle(&CancellationToken::new()))
            .await
            .unwrap();

        match report.outcome {
            Err(CycleError::Panicked { stage, message }) => {
                assert_eq!(stage, "consumer");
                assert_eq!(message, "validator exploded on 3");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_counter_error_fails_the_cycle() {
        let counter = Arc::new(
            ScriptedCounter::new(vec![0]).fail_first(1, StageError::fatal("store dropped")),
        );
        let ctrl = controller(
            counter,
            EndlessCrawler::new(Duration::from_millis(10)),
            ScriptedValidator::accept_all(),
        );

        let report = timeout(Duration::from_secs(5), ctrl.run_cycle(&CancellationToken::new()))
            .await
            .unwrap();

        assert!(matches!(
            report.outcome,
            Err(CycleError::Watchdog(StageError::Fatal { .. }))
        ));
        assert_eq!(report.watchdog, None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_running_cycle() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            EndlessCrawler::new(Duration::from_millis(10)),
            ScriptedValidator::accept_all(),
        );
        let token = CancellationToken::new();

        let (report, ()) = tokio::join!(ctrl.run_cycle(&token), async {
            sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        assert_eq!(report.outcome, Ok(CycleEnd::Interrupted));
        assert!(!report.stopped_by_watchdog());
        assert!(report.stats.produced >= report.stats.processed());
        assert!(report.stats.produced > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_keeps_going_after_failed_cycles() {
        let ctrl = controller(
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![1]).fail_at(0, StageError::fatal("no sources")),
            ScriptedValidator::accept_all(),
        );
        let mut rx = ctrl.bus().subscribe();
        let token = CancellationToken::new();

        // cycles at 0s, 300s and 600s
        tokio::join!(ctrl.run(token.clone()), async {
            sleep(Duration::from_secs(650)).await;
            token.cancel();
        });

        assert_eq!(ctrl.cycles_started(), 3);
        let kinds = drain_kinds(&mut rx);
        let failed = kinds.iter().filter(|k| **k == EventKind::CycleFailed).count();
        let resets = kinds.iter().filter(|k| **k == EventKind::ProducerReset).count();
        assert_eq!(failed, 3);
        assert_eq!(resets, 2);
        assert_eq!(kinds.last(), Some(&EventKind::ShutdownRequested));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_the_cycle() {
        let recorder = Arc::new(Recorder::default());
        let ctrl = PoolController::builder(
            cfg(),
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![1, 2]),
            ScriptedValidator::accept_all(),
        )
        .with_subscriber(recorder.clone())
        .build()
        .unwrap();

        ctrl.run_cycle(&CancellationToken::new()).await;
        sleep(Duration::from_millis(10)).await;

        let kinds = recorder.kinds();
        assert_eq!(kinds.first(), Some(&EventKind::CycleStarted));
        assert!(kinds.contains(&EventKind::QueueDrained));
        assert_eq!(kinds.last(), Some(&EventKind::CycleFinished));
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let cfg = PoolConfig {
            lower_limit: 200,
            upper_limit: 100,
            ..PoolConfig::default()
        };
        let built = PoolController::builder(
            cfg,
            Arc::new(AtomicCounter::new(0)),
            ListCrawler::new(vec![]),
            ScriptedValidator::accept_all(),
        )
        .build();
        assert!(matches!(
            built,
            Err(ConfigError::LimitsInverted { lower: 200, upper: 100 })
        ));
    }
}
