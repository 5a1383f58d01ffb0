//! Error taxonomy for the execution engines.

use crate::ports::{SourceError, StoreError};
use alphapulse_domain::DomainError;
use alphapulse_domain::entities::OrderId;
use alphapulse_domain::enums::OrderStatus;
use thiserror::Error;

/// Errors surfaced by the lifecycle engine, the schedulers and the facade.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Malformed or policy-rejected input. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown order, job or realtime configuration.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The identifier that did not resolve.
        id: String,
    },

    /// Market data or signal source unreachable or timed out.
    #[error("transient fetch failure: {0}")]
    TransientFetch(#[from] SourceError),

    /// The order already left `OPEN`.
    #[error("order {order_id} is {status}, expected OPEN")]
    StateConflict {
        /// Order that was targeted.
        order_id: OrderId,
        /// Status observed at the time of the attempt.
        status: OrderStatus,
    },

    /// Order store failure that survived retries.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ExecutionError {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether the next natural firing may succeed where this one failed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch(_) | Self::Persistence(_))
    }
}

impl From<DomainError> for ExecutionError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::Validation(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<StoreError> for ExecutionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => Self::not_found("order", id),
            StoreError::Backend(msg) => Self::Persistence(msg),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_follow_taxonomy() {
        let err: ExecutionError = StoreError::OrderNotFound(OrderId(7)).into();
        assert!(matches!(err, ExecutionError::NotFound { kind: "order", .. }));

        let err: ExecutionError = StoreError::Backend("pool closed".into()).into();
        assert!(err.is_transient());

        let err: ExecutionError = DomainError::validation("entry price is required").into();
        assert_eq!(err.to_string(), "validation failed: entry price is required");

        let err: ExecutionError = SourceError::Unavailable("503".into()).into();
        assert!(matches!(err, ExecutionError::TransientFetch(_)));
    }
}
