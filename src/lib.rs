//! # poolvisor
//!
//! **Poolvisor** keeps a pool of validated resources (proxies, accounts,
//! endpoints...) inside a size band. When the pool runs low it runs one
//! bounded crawl/validate cycle, and it stops crawling before the pool overshoots.
//!
//! You bring three collaborators:
//! - a [`Crawler`] that discovers candidates,
//! - a [`Validator`] that tests a candidate and persists it when valid,
//! - a [`ResourceCounter`] that reports how many valid resources exist.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │  PoolController (admission loop)                                 │
//!   │   Idle: count < lower_limit ? run_cycle : sleep(check_cycle_time)│
//!   └──────┬──────────────────────┬──────────────────────┬─────────────┘
//!          ▼ inline               ▼ spawned              ▼ spawned
//!   ┌──────────────┐       ┌──────────────┐       ┌──────────────┐
//!   │   Producer   │ put   │   Consumer   │       │   Watchdog   │
//!   │  (Crawler)   │──────►│ (Validator)  │       │  (Counter)   │
//!   └──────▲───────┘ Queue └──────┬───────┘       └──────┬───────┘
//!          │                      │ persists             │ count > upper × ratio
//!          │                      ▼                      │
//!          │               ResourceCounter ◄─────────────┤
//!          └────────────── StopHandle::stop() ◄──────────┘
//!
//!   Controller / Watchdog / Consumer ── publish(Event) ──► Bus ──► SubscriberSet
//!                                                                   ├─► LogWriter
//!                                                                   └─► your Subscribe impls
//! ```
//!
//! ### One cycle
//! ```text
//! CycleStarted
//!   ├─► spawn consumer loops and the watchdog
//!   ├─► producer.start(queue)        (returns on exhaustion or stop)
//!   ├─► queue.join()                 (every put item was marked done)
//!   ├─► QueueDrained
//!   └─► teardown: cancel consumer, set completion flag, close queue, await both
//! CycleFinished | CycleFailed
//!   └─► sleep(check_interval_time) ─► producer.reset() ─► Idle
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                              |
//! |-------------------|----------------------------------------------------------|-------------------------------------------------|
//! | **Controller**    | Admission loop, cycle orchestration, graceful shutdown.  | [`PoolController`], [`ControllerBuilder`]       |
//! | **Stages**        | Adapters around your crawler, validator and counter.     | [`Crawler`], [`Validator`], [`ResourceCounter`] |
//! | **Primitives**    | Completion-tracking queue and one-shot flag.             | [`CompletionQueue`], [`CompletionFlag`]         |
//! | **Subscriber API**| Hook into controller events (logging, metrics, alerts).  | [`Subscribe`], [`LogWriter`]                    |
//! | **Errors**        | Typed errors per layer.                                  | [`StageError`], [`CycleError`], [`ConfigError`] |
//! | **Configuration** | Limits and timings, loadable from TOML.                  | [`PoolConfig`]                                  |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use poolvisor::{
//!     AtomicCounter, Crawler, LogWriter, PoolConfig, PoolController, Sink, StageError,
//!     Subscribe, Validator, Verdict,
//! };
//!
//! struct Seeds(Vec<String>);
//!
//! #[async_trait]
//! impl Crawler for Seeds {
//!     type Item = String;
//!     async fn crawl(&self, sink: &Sink<String>) -> Result<(), StageError> {
//!         for s in &self.0 {
//!             if sink.is_stopped() { break; }
//!             sink.put(s.clone()).await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! struct Persist(AtomicCounter);
//!
//! #[async_trait]
//! impl Validator for Persist {
//!     type Item = String;
//!     async fn validate(&self, _proxy: String) -> Result<Verdict, StageError> {
//!         self.0.add(1);
//!         Ok(Verdict::Accepted)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let counter = AtomicCounter::new(0);
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let controller = PoolController::builder(
//!         PoolConfig::default(),
//!         Arc::new(counter.clone()),
//!         Seeds(vec!["10.0.0.1:8080".into()]),
//!         Persist(counter),
//!     )
//!     .with_subscribers(subs)
//!     .build()?;
//!
//!     controller.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod primitives;
mod stages;
mod subscribers;
mod telemetry;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use config::PoolConfig;
pub use crate::core::{
    Admission, ControllerBuilder, CycleCounters, CycleEnd, CycleReport, CycleStats,
    PoolController, Watchdog, WatchdogExit, wait_for_shutdown_signal,
};
pub use error::{ConfigError, CycleError, QueueError, StageError};
pub use events::{Bus, Event, EventKind};
pub use policies::JitterPolicy;
pub use primitives::{CompletionFlag, CompletionQueue};
pub use stages::{
    AtomicCounter, Consumer, CounterRef, Crawler, Producer, ResourceCounter, Sink, StopHandle,
    Validator, Verdict,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use telemetry::{LOG_ENV, Verbosity, init_tracing};
