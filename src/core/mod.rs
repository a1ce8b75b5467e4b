//! Runtime core: the admission loop and everything one cycle needs.
//!
//! - [`controller`]: [`PoolController`], idle checks and cycle orchestration
//! - [`builder`]: [`ControllerBuilder`], config validation and event wiring
//! - [`watchdog`]: [`Watchdog`], stops the producer before the pool overshoots
//! - [`cycle`]: per-cycle tallies and the [`CycleReport`]
//! - [`shutdown`]: termination signal handling

mod builder;
mod controller;
mod cycle;
mod shutdown;
mod watchdog;

pub use builder::ControllerBuilder;
pub use controller::{Admission, PoolController};
pub use cycle::{CycleCounters, CycleEnd, CycleReport, CycleStats};
pub use shutdown::wait_for_shutdown_signal;
pub use watchdog::{Watchdog, WatchdogExit};
