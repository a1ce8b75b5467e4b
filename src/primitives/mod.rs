//! Coordination primitives shared by the stages of a cycle.
//!
//! - [`CompletionQueue`] FIFO of candidate items with an unfinished-count and `join`
//! - [`CompletionFlag`]  one-shot latch telling the watchdog the cycle ended on its own

mod flag;
mod queue;

pub use flag::CompletionFlag;
pub use queue::CompletionQueue;
