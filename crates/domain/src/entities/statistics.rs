use crate::entities::order::Order;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome counts and summed profit of the orders of one symbol.
///
/// An order counts as a win when its final profit is positive and as a
/// loss when it is negative. Break-even and open orders are neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStatistics {
    pub symbol: String,
    pub total_orders: u64,
    pub open_orders: u64,
    pub closed_orders: u64,
    pub wins: u64,
    pub losses: u64,
    /// Sum of final profit percentages.
    pub total_profit: Decimal,
}

impl SymbolStatistics {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, order: &Order) {
        self.total_orders += 1;
        if order.is_open() {
            self.open_orders += 1;
        } else {
            self.closed_orders += 1;
        }
        if let Some(profit) = order.final_profit_percentage {
            if profit > Decimal::ZERO {
                self.wins += 1;
            } else if profit < Decimal::ZERO {
                self.losses += 1;
            }
            self.total_profit += profit;
        }
    }

    /// Wins over decided orders in percent, rounded to 2 decimal places.
    /// `None` while no order has won or lost.
    pub fn win_rate(&self) -> Option<Decimal> {
        let decided = self.wins + self.losses;
        if decided == 0 {
            return None;
        }
        let rate = Decimal::from(self.wins) / Decimal::from(decided) * Decimal::ONE_HUNDRED;
        Some(rate.round_dp(2))
    }

    /// Groups orders by symbol, most orders first.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Vec<Self> {
        let mut by_symbol: BTreeMap<&str, Self> = BTreeMap::new();
        for order in orders {
            by_symbol
                .entry(order.symbol.as_str())
                .or_insert_with(|| Self::new(order.symbol.as_str()))
                .record(order);
        }
        let mut rows: Vec<Self> = by_symbol.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_orders
                .cmp(&a.total_orders)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        rows
    }

    /// Sums per-symbol rows into one row labelled `symbol`.
    pub fn total<'a>(symbol: &str, rows: impl IntoIterator<Item = &'a Self>) -> Self {
        rows.into_iter().fold(Self::new(symbol), |mut acc, row| {
            acc.total_orders += row.total_orders;
            acc.open_orders += row.open_orders;
            acc.closed_orders += row.closed_orders;
            acc.wins += row.wins;
            acc.losses += row.losses;
            acc.total_profit += row.total_profit;
            acc
        })
    }
}
