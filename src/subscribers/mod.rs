//! # Event subscribers.
//!
//! ```text
//! Controller / Watchdog / Consumer ── publish(Event) ──► Bus ──► listener
//!                                                                   │
//!                                                        SubscriberSet::emit
//!                                                     ┌─────────┬───┴─────┐
//!                                                     ▼         ▼         ▼
//!                                                 LogWriter  Metrics   Custom
//! ```
//!
//! - [`Subscribe`] the handler trait
//! - [`SubscriberSet`] per-subscriber bounded queues, workers and panic isolation
//! - [`LogWriter`] built-in `tracing` renderer

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
