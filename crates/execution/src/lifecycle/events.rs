//! Outcomes of lifecycle operations.

use crate::trigger::{Evaluation, Trigger};
use alphapulse_domain::entities::OrderId;
use alphapulse_domain::enums::{Direction, OrderStatus, TargetLevel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why an order left `OPEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Stop-loss reached.
    StopLoss,
    /// Take-profit level reached.
    TakeProfit(TargetLevel),
    /// Operator close.
    Manual,
}

impl CloseReason {
    /// Status written for this reason.
    #[must_use]
    pub fn status(self) -> OrderStatus {
        match self {
            Self::StopLoss => OrderStatus::StopLoss,
            Self::TakeProfit(level) => level.status(),
            Self::Manual => OrderStatus::Closed,
        }
    }

    /// Reason matching a trigger, `None` when nothing fired.
    #[must_use]
    pub fn from_trigger(trigger: Trigger) -> Option<Self> {
        match trigger {
            Trigger::None => None,
            Trigger::StopLoss => Some(Self::StopLoss),
            Trigger::TakeProfit(level) => Some(Self::TakeProfit(level)),
        }
    }
}

/// Order state right after a transition away from `OPEN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedOrder {
    /// Order id.
    pub order_id: OrderId,
    /// Symbol.
    pub symbol: String,
    /// Direction.
    pub direction: Direction,
    /// Entry price.
    pub entry_price: Decimal,
    /// Terminal status written.
    pub status: OrderStatus,
    /// Why it closed.
    pub reason: CloseReason,
    /// Exit price.
    pub closed_price: Decimal,
    /// Realized profit in percent.
    pub profit_percentage: Decimal,
    /// Close timestamp.
    pub closed_at: DateTime<Utc>,
}

/// Result of [`apply_trigger`](super::OrderLifecycleEngine::apply_trigger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This call moved the order out of `OPEN`.
    Transitioned(ClosedOrder),
    /// The order had already left `OPEN`; nothing was written.
    AlreadyClosed,
    /// The evaluation was not terminal.
    NotTriggered,
}

impl TransitionOutcome {
    /// Whether this call performed the transition.
    #[must_use]
    pub fn is_transitioned(&self) -> bool {
        matches!(self, Self::Transitioned(_))
    }
}

/// Result of tracking one order against one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracked {
    /// Order evaluated.
    pub order_id: OrderId,
    /// Evaluation computed from the window.
    pub evaluation: Evaluation,
    /// What happened to the order.
    pub outcome: TransitionOutcome,
    /// Whether an audit sample was written.
    pub sample_recorded: bool,
}
