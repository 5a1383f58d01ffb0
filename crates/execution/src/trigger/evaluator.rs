use alphapulse_domain::entities::{Order, OrderId, TrackingSample};
use alphapulse_domain::enums::{Direction, OrderStatus, TargetLevel, TrackingCadence};
use alphapulse_domain::value_objects::PriceWindow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition detected in a price window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Neither stop-loss nor take-profit reached.
    None,
    /// Stop-loss reached.
    StopLoss,
    /// Take-profit reached; the best level in the window.
    TakeProfit(TargetLevel),
}

impl Trigger {
    /// Status the order moves to, `None` when nothing fired.
    #[must_use]
    pub fn target_status(self) -> Option<OrderStatus> {
        match self {
            Self::None => None,
            Self::StopLoss => Some(OrderStatus::StopLoss),
            Self::TakeProfit(level) => Some(level.status()),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::StopLoss => f.write_str("stop_loss"),
            Self::TakeProfit(level) => write!(f, "take_profit_{}", level.as_str().to_lowercase()),
        }
    }
}

/// Outcome of evaluating one order against one price window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Detected trigger.
    pub trigger: Trigger,
    /// Price the evaluation is anchored on, the window close.
    pub price: Decimal,
    /// Signed profit at `price`.
    pub profit_percentage: Decimal,
}

impl Evaluation {
    /// Whether this evaluation should move the order out of `OPEN`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.trigger != Trigger::None
    }

    /// Audit record carrying this evaluation's trigger flags.
    #[must_use]
    pub fn sample(
        &self,
        order_id: OrderId,
        cadence: TrackingCadence,
        tracked_at: DateTime<Utc>,
    ) -> TrackingSample {
        let triggered_target = match self.trigger {
            Trigger::TakeProfit(level) => Some(level),
            _ => None,
        };
        TrackingSample {
            order_id,
            cadence,
            price: self.price,
            profit_percentage: self.profit_percentage,
            stop_loss_triggered: self.trigger == Trigger::StopLoss,
            take_profit_triggered: triggered_target.is_some(),
            triggered_target,
            tracked_at,
        }
    }
}

/// Whether the window reached the stop-loss. Orders without a stop never
/// trigger.
#[must_use]
pub fn check_stop_loss(order: &Order, window: &PriceWindow) -> bool {
    let Some(stop) = order.stop_loss else {
        return false;
    };
    match order.direction {
        Direction::Buy => window.low <= stop,
        Direction::Sell => window.high >= stop,
    }
}

/// Highest take-profit level reached in the window.
///
/// Targets are scanned T3, T2, T1 so that a window spanning several
/// targets resolves to the best one.
#[must_use]
pub fn check_take_profit(order: &Order, window: &PriceWindow) -> Option<TargetLevel> {
    order
        .targets
        .best_first()
        .find(|&(_, price)| match order.direction {
            Direction::Buy => window.high >= price,
            Direction::Sell => window.low <= price,
        })
        .map(|(level, _)| level)
}

/// Evaluates an order against a price window.
///
/// Stop-loss wins when the same window also reaches a take-profit level:
/// the order of events inside a window is unknown.
#[must_use]
pub fn evaluate(order: &Order, window: &PriceWindow) -> Evaluation {
    let trigger = if check_stop_loss(order, window) {
        Trigger::StopLoss
    } else if let Some(level) = check_take_profit(order, window) {
        Trigger::TakeProfit(level)
    } else {
        Trigger::None
    };

    Evaluation {
        trigger,
        price: window.close,
        profit_percentage: order.profit_percentage(window.close),
    }
}
