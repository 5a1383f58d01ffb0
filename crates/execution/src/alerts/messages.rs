//! Alert text.

use crate::lifecycle::{CloseReason, ClosedOrder};
use alphapulse_domain::entities::Order;
use rust_decimal::Decimal;

fn signed(profit: Decimal) -> String {
    if profit.is_sign_negative() {
        format!("{:.2}%", profit)
    } else {
        format!("+{:.2}%", profit)
    }
}

/// Alert sent when an order leaves `OPEN`.
pub fn transition_message(closed: &ClosedOrder) -> String {
    let headline = match closed.reason {
        CloseReason::StopLoss => "Stop-loss hit".to_string(),
        CloseReason::TakeProfit(level) => format!("Take-profit {level} hit"),
        CloseReason::Manual => "Closed manually".to_string(),
    };
    format!(
        "[AlphaPulse] {headline}\n\
         Order {id} {symbol} {direction}\n\
         Entry: {entry}\n\
         Exit: {exit}\n\
         Profit: {profit}\n\
         Status: {status}\n\
         Time: {time}",
        id = closed.order_id,
        symbol = closed.symbol,
        direction = closed.direction,
        entry = closed.entry_price,
        exit = closed.closed_price,
        profit = signed(closed.profit_percentage),
        status = closed.status,
        time = closed.closed_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Alert sent when a signal opens a new order.
pub fn order_opened_message(order: &Order) -> String {
    let stop = order
        .stop_loss
        .map_or_else(|| "n/a".to_string(), |s| s.to_string());
    let targets = order
        .targets
        .best_first()
        .map(|(level, price)| format!("{level}={price}"))
        .collect::<Vec<_>>();
    let model = order.ai_model.as_deref().unwrap_or("default");
    format!(
        "[AlphaPulse] New order\n\
         Order {id} {symbol} {direction}\n\
         Model: {model} | Risk: {risk}\n\
         Entry: {entry}\n\
         Stop: {stop}\n\
         Targets: {targets}",
        id = order.id,
        symbol = order.symbol,
        direction = order.direction,
        risk = order.risk_level,
        entry = order.entry_price,
        targets = if targets.is_empty() {
            "n/a".to_string()
        } else {
            targets.join(", ")
        },
    )
}
