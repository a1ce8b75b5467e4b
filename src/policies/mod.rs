//! Timing policies.
//!
//! - [`JitterPolicy`] randomization of the watchdog poll interval (default: full jitter)

mod jitter;

pub use jitter::JitterPolicy;
