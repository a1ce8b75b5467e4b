//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `PoolController`, `Watchdog`, `Consumer`, `SubscriberSet` workers.
//! - **Consumers**: the controller's listener (fans out to `SubscriberSet`), tests.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
