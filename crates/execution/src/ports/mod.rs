//! Boundaries to the outside world.
//!
//! The engines only talk to the order store, the market data source, the
//! signal generator and the notifier through these traits, so every
//! collaborator can be replaced by a fake in tests.

mod memory;

pub use memory::InMemoryOrderStore;

use alphapulse_domain::entities::{
    NewOrder, Order, OrderId, RealtimeConfig, SignalParams, SymbolStatistics, TrackingSample,
    TradingSignal,
};
use alphapulse_domain::enums::{KlineInterval, OrderStatus};
use alphapulse_domain::value_objects::PriceWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by an [`OrderStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No order with this id.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    /// Backend failure (connection, query, decoding).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors raised by a [`PriceSource`] or a [`SignalGenerator`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Remote service unreachable or answered with an error status.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The call did not complete in time.
    #[error("source call timed out after {0:?}")]
    Timeout(Duration),
    /// The answer could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Error raised by a [`Notifier`]. Always swallowed by callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Terminal fields written when an order leaves `OPEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    /// New terminal status.
    pub status: OrderStatus,
    /// Price the order was closed at.
    pub closed_price: Decimal,
    /// Realized profit in percent.
    pub closed_profit: Decimal,
    /// Close timestamp.
    pub closed_at: DateTime<Utc>,
}

/// Filter for order listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only orders in this status.
    pub status: Option<OrderStatus>,
    /// Only orders for this symbol.
    pub symbol: Option<String>,
    /// Maximum number of rows, newest first.
    pub limit: Option<usize>,
}

/// Durable order records. The single source of truth for order status.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a validated order as `OPEN`.
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Looks an order up by id.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders currently `OPEN`.
    async fn list_open(&self) -> Result<Vec<Order>, StoreError>;

    /// Orders matching `filter`, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Moves an order out of `OPEN`.
    ///
    /// Must be a conditional write: returns `true` only for the caller that
    /// performed the transition, `false` when the order had already left
    /// `OPEN`. Safe under concurrent calls for the same id.
    ///
    /// # Errors
    /// Returns [`StoreError::OrderNotFound`] for unknown ids.
    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<bool, StoreError>;

    /// Appends to the audit trail.
    async fn append_sample(&self, sample: &TrackingSample) -> Result<(), StoreError>;

    /// Audit trail of one order, oldest first.
    async fn list_samples(&self, id: OrderId) -> Result<Vec<TrackingSample>, StoreError>;

    /// Orders opted into realtime tracking with their sub-interval.
    async fn list_realtime_enabled(&self) -> Result<HashMap<OrderId, KlineInterval>, StoreError>;

    /// Realtime configuration of one order, enabled or not.
    async fn realtime_config(&self, id: OrderId) -> Result<Option<RealtimeConfig>, StoreError>;

    /// Creates or replaces the realtime configuration of an order.
    async fn upsert_realtime(&self, config: RealtimeConfig) -> Result<(), StoreError>;

    /// Per-symbol outcome counts, most orders first. Restricted to one
    /// symbol when `symbol` is given.
    async fn statistics(&self, symbol: Option<&str>) -> Result<Vec<SymbolStatistics>, StoreError>;
}

/// Market data.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Last traded price.
    async fn current_price(&self, symbol: &str) -> Result<Decimal, SourceError>;

    /// High/low/close over the last `lookback` klines of `interval`.
    async fn range(
        &self,
        symbol: &str,
        interval: KlineInterval,
        lookback: u32,
    ) -> Result<PriceWindow, SourceError>;
}

/// Produces trading recommendations. May be slow, fail or time out.
#[async_trait]
pub trait SignalGenerator: Send + Sync {
    /// Analyzes `symbol` with the given parameters.
    async fn analyze(&self, symbol: &str, params: &SignalParams)
    -> Result<TradingSignal, SourceError>;
}

/// Best-effort alert delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a text alert.
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Runs a source call with a deadline.
pub(crate) async fn source_call<T, F>(limit: Duration, call: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(SourceError::Timeout(limit)))
}

/// Runs a store call with a deadline.
pub(crate) async fn store_call<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(StoreError::Backend(format!(
            "store call timed out after {limit:?}"
        )))
    })
}
