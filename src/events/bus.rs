//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. The controller, the watchdog, the
//! consumer and subscriber workers publish; the controller's listener forwards
//! everything to its [`SubscriberSet`](crate::SubscriberSet), and tests may
//! subscribe directly.
//!
//! ```text
//!   Controller ──┐
//!   Watchdog   ──┼──► Bus ──► listener ──► SubscriberSet ──► LogWriter, ...
//!   Consumer   ──┘     └────► bus.subscribe() (ad-hoc receivers)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks; events are dropped when nobody listens.
//! - The ring buffer keeps the most recent `capacity` events; slow receivers
//!   observe `RecvError::Lagged(n)`.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Arc<Event>>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(Arc::new(ev));
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.tx.subscribe()
    }
}
