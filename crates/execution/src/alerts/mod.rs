//! Alert delivery.
//!
//! Provides:
//! - Console and fan-out notifiers
//! - Alert text for order transitions and new orders
//! - Best-effort delivery that never propagates failures

mod messages;
mod notifier;

pub use messages::*;
pub use notifier::*;
