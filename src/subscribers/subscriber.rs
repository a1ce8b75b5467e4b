//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging handlers into the
//! controller's event stream (logging, metrics, alerting).
//!
//! Each subscriber gets its own bounded queue and worker task inside a
//! [`SubscriberSet`](crate::SubscriberSet); a slow or panicking subscriber only
//! affects itself.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use poolvisor::{Event, EventKind, Subscribe};
//!
//! struct Trips;
//!
//! #[async_trait]
//! impl Subscribe for Trips {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::WatchdogTripped) {
//!             // page someone, bump a gauge...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "trips" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for controller observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event. Events arrive in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
