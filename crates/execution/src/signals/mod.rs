//! Trading-signal scheduling.
//!
//! Each job binds one symbol to one cadence and its own signal
//! parameters. Every firing asks the signal generator for a
//! recommendation and opens an order when the signal qualifies.

mod job;
mod scheduler;

pub use job::*;
pub use scheduler::*;
