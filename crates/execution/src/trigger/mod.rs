//! Stop-loss and take-profit trigger evaluation.
//!
//! Evaluation is pure: it maps an order and a price window to a decision
//! and never touches the store.

mod evaluator;

pub use evaluator::*;
