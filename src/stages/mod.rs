//! Adapters around the external collaborators of a cycle.
//!
//! - [`counter`]: [`ResourceCounter`], read by the controller and the watchdog
//! - [`crawler`]: [`Crawler`] + [`Producer`], fills the queue
//! - [`validator`]: [`Validator`] + [`Consumer`], drains the queue
//!
//! ```text
//! Crawler ──► Producer ──► Sink::put ──► CompletionQueue ──► Consumer ──► Validator
//!                ▲                                                          │
//!                └── StopHandle ◄── Watchdog ◄── ResourceCounter ◄──────────┘ (persists)
//! ```

pub mod counter;
pub mod crawler;
pub mod validator;

pub use counter::{AtomicCounter, CounterRef, ResourceCounter};
pub use crawler::{Crawler, Producer, Sink, StopHandle};
pub use validator::{Consumer, Validator, Verdict};
