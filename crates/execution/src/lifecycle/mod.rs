//! Order lifecycle.
//!
//! The lifecycle engine is the only writer of order status:
//! - Opening validated orders
//! - Recording tracking samples
//! - Moving an order out of `OPEN` exactly once
//! - Operator-initiated closes

mod engine;
mod events;

pub use engine::*;
pub use events::*;
