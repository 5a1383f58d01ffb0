//! Process-local order store, used when no database is configured and in tests.

use super::{OrderFilter, OrderStore, StatusUpdate, StoreError};
use alphapulse_domain::entities::{
    NewOrder, Order, OrderId, RealtimeConfig, SymbolStatistics, TrackingSample,
};
use alphapulse_domain::enums::{KlineInterval, OrderStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    orders: BTreeMap<OrderId, Order>,
    samples: HashMap<OrderId, Vec<TrackingSample>>,
    realtime: HashMap<OrderId, RealtimeConfig>,
}

/// [`OrderStore`] backed by in-process maps.
///
/// The status transition runs under a write lock, which gives the same
/// conditional-update guarantee as the database implementation.
#[derive(Default)]
pub struct InMemoryOrderStore {
    state: RwLock<MemoryState>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples recorded for an order.
    pub async fn sample_count(&self, id: OrderId) -> usize {
        self.state
            .read()
            .await
            .samples
            .get(&id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = OrderId(state.next_id);
        let order = Order::open(id, order, Utc::now());
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_open(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.is_open())
            .cloned()
            .collect())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().await;
        let orders = state
            .orders
            .values()
            .rev()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.symbol.as_deref().is_none_or(|s| o.symbol == s))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(orders)
    }

    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        if order.status != OrderStatus::Open {
            return Ok(false);
        }
        order.status = update.status;
        order.closed_price = Some(update.closed_price);
        order.final_profit_percentage = Some(update.closed_profit);
        order.closed_at = Some(update.closed_at);
        Ok(true)
    }

    async fn append_sample(&self, sample: &TrackingSample) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&sample.order_id) {
            return Err(StoreError::OrderNotFound(sample.order_id));
        }
        state
            .samples
            .entry(sample.order_id)
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn list_samples(&self, id: OrderId) -> Result<Vec<TrackingSample>, StoreError> {
        let mut samples = self
            .state
            .read()
            .await
            .samples
            .get(&id)
            .cloned()
            .unwrap_or_default();
        samples.sort_by_key(|s| s.tracked_at);
        Ok(samples)
    }

    async fn list_realtime_enabled(&self) -> Result<HashMap<OrderId, KlineInterval>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .realtime
            .values()
            .filter(|c| c.enabled)
            .map(|c| (c.order_id, c.interval))
            .collect())
    }

    async fn realtime_config(&self, id: OrderId) -> Result<Option<RealtimeConfig>, StoreError> {
        Ok(self.state.read().await.realtime.get(&id).copied())
    }

    async fn upsert_realtime(&self, config: RealtimeConfig) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&config.order_id) {
            return Err(StoreError::OrderNotFound(config.order_id));
        }
        state.realtime.insert(config.order_id, config);
        Ok(())
    }

    async fn statistics(&self, symbol: Option<&str>) -> Result<Vec<SymbolStatistics>, StoreError> {
        let state = self.state.read().await;
        let orders = state
            .orders
            .values()
            .filter(|o| symbol.is_none_or(|s| o.symbol.eq_ignore_ascii_case(s)));
        Ok(SymbolStatistics::from_orders(orders))
    }
}
