//! Signal-driven order automation engine.
//!
//! This crate provides the execution core:
//! - Trigger evaluation of stop-loss and take-profit levels
//! - Order lifecycle state machine with idempotent transitions
//! - Profit tracking over several overlapping cadences
//! - Scheduled trading-signal jobs with pause/resume/run-now control
//! - Ports to the order store, market data, signal generator and notifier

/// Prelude module for convenient imports.
pub mod prelude;

/// Alert delivery.
pub mod alerts;
/// Control facade.
pub mod engine;
/// Error types.
pub mod error;
/// Order lifecycle.
pub mod lifecycle;
/// Boundaries to external collaborators.
pub mod ports;
/// Timer scheduler.
pub mod scheduler;
/// Trading-signal jobs.
pub mod signals;
/// Profit tracking.
pub mod tracking;
/// Trigger evaluation.
pub mod trigger;

#[cfg(test)]
mod testing;

pub use error::{ExecutionError, Result};
