//! Core domain types for signal-driven order tracking.
//!
//! Everything in this crate is plain data plus validation. Nothing here
//! performs I/O; the engines live in `alphapulse-execution`.

pub mod entities;
pub mod enums;
pub mod error;
pub mod value_objects;

pub use error::DomainError;
