//! Profit tracking.
//!
//! Every cadence runs on its own timer and sweeps the open orders due for
//! it. Cadences are not merged: an order may be evaluated by several
//! cadences in the same minute, and the lifecycle engine's idempotent
//! transition keeps the outcome single.

mod sweep;
mod tracker;

pub use sweep::*;
pub use tracker::*;
