use crate::entities::order::OrderId;
use crate::enums::{KlineInterval, TargetLevel, TrackingCadence};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One evaluation of one order by one sweep. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSample {
    pub order_id: OrderId,
    pub cadence: TrackingCadence,
    pub price: Decimal,
    pub profit_percentage: Decimal,
    pub stop_loss_triggered: bool,
    pub take_profit_triggered: bool,
    pub triggered_target: Option<TargetLevel>,
    pub tracked_at: DateTime<Utc>,
}

/// Per-order opt-in to the realtime cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub order_id: OrderId,
    pub enabled: bool,
    pub interval: KlineInterval,
}
