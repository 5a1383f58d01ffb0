use crate::enums::{Direction, KlineInterval, OrderStatus, Recommendation, RiskLevel, TargetLevel};
use crate::error::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Up to three take-profit prices, T1 nearest to entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeProfitTargets {
    pub t1: Option<Decimal>,
    pub t2: Option<Decimal>,
    pub t3: Option<Decimal>,
}

impl TakeProfitTargets {
    pub fn new(t1: Option<Decimal>, t2: Option<Decimal>, t3: Option<Decimal>) -> Self {
        Self { t1, t2, t3 }
    }

    pub fn get(&self, level: TargetLevel) -> Option<Decimal> {
        match level {
            TargetLevel::T1 => self.t1,
            TargetLevel::T2 => self.t2,
            TargetLevel::T3 => self.t3,
        }
    }

    pub fn set(&mut self, level: TargetLevel, price: Decimal) {
        match level {
            TargetLevel::T1 => self.t1 = Some(price),
            TargetLevel::T2 => self.t2 = Some(price),
            TargetLevel::T3 => self.t3 = Some(price),
        }
    }

    /// Present targets, highest reward first.
    pub fn best_first(&self) -> impl Iterator<Item = (TargetLevel, Decimal)> + '_ {
        TargetLevel::BEST_FIRST
            .into_iter()
            .filter_map(|level| self.get(level).map(|price| (level, price)))
    }

    pub fn is_empty(&self) -> bool {
        self.t1.is_none() && self.t2.is_none() && self.t3.is_none()
    }

    /// Targets must be positive and strictly ordered T1 < T2 < T3 for BUY
    /// (descending for SELL). They are not compared with the entry price:
    /// the market may already be past T1 when an order opens.
    pub fn validate(&self, direction: Direction) -> DomainResult<()> {
        let mut previous: Option<Decimal> = None;
        for level in [TargetLevel::T1, TargetLevel::T2, TargetLevel::T3] {
            let Some(price) = self.get(level) else {
                continue;
            };
            if price <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "{level} target must be positive, got {price}"
                )));
            }
            let ordered = previous.is_none_or(|prev| match direction {
                Direction::Buy => price > prev,
                Direction::Sell => price < prev,
            });
            if !ordered {
                return Err(DomainError::validation(format!(
                    "{level} target {price} out of order for {direction}"
                )));
            }
            previous = Some(price);
        }
        Ok(())
    }
}

/// Unvalidated request to open an order, from a signal or an operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub interval: Option<KlineInterval>,
    pub ai_model: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub risk_level: Option<RiskLevel>,
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub targets: TakeProfitTargets,
    pub position_size_percentage: Option<Decimal>,
    pub analysis_summary: Option<String>,
}

impl OrderIntent {
    /// Checks completeness, price geometry and the auto-open risk policy.
    pub fn validate(self) -> DomainResult<NewOrder> {
        let symbol = self.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(DomainError::validation("symbol is required"));
        }
        let recommendation = self
            .recommendation
            .ok_or_else(|| DomainError::validation("direction is required"))?;
        let direction = recommendation.direction().ok_or_else(|| {
            DomainError::validation(format!("{symbol}: HOLD recommendation cannot open an order"))
        })?;
        let risk_level = self
            .risk_level
            .ok_or_else(|| DomainError::validation("risk level is required"))?;
        if !risk_level.permits_auto_open() {
            return Err(DomainError::validation(format!(
                "{symbol}: {risk_level} risk signals are not opened"
            )));
        }
        let entry_price = self
            .entry_price
            .ok_or_else(|| DomainError::validation("entry price is required"))?;
        if entry_price <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "entry price must be positive, got {entry_price}"
            )));
        }
        if let Some(stop) = self.stop_loss.filter(|stop| *stop <= Decimal::ZERO) {
            return Err(DomainError::validation(format!(
                "stop loss must be positive, got {stop}"
            )));
        }
        self.targets.validate(direction)?;

        Ok(NewOrder {
            symbol,
            interval: self.interval.unwrap_or_default(),
            ai_model: self.ai_model,
            direction,
            risk_level,
            entry_price,
            stop_loss: self.stop_loss,
            targets: self.targets,
            position_size_percentage: self.position_size_percentage,
            analysis_summary: self.analysis_summary,
        })
    }
}

/// Validated order ready to be inserted as `OPEN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub symbol: String,
    pub interval: KlineInterval,
    pub ai_model: Option<String>,
    pub direction: Direction,
    pub risk_level: RiskLevel,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub targets: TakeProfitTargets,
    pub position_size_percentage: Option<Decimal>,
    pub analysis_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub interval: KlineInterval,
    pub ai_model: Option<String>,
    pub direction: Direction,
    pub risk_level: RiskLevel,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub targets: TakeProfitTargets,
    pub position_size_percentage: Option<Decimal>,
    pub analysis_summary: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_price: Option<Decimal>,
    pub final_profit_percentage: Option<Decimal>,
}

impl Order {
    pub fn open(id: OrderId, new: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            symbol: new.symbol,
            interval: new.interval,
            ai_model: new.ai_model,
            direction: new.direction,
            risk_level: new.risk_level,
            entry_price: new.entry_price,
            stop_loss: new.stop_loss,
            targets: new.targets,
            position_size_percentage: new.position_size_percentage,
            analysis_summary: new.analysis_summary,
            status: OrderStatus::Open,
            created_at,
            closed_at: None,
            closed_price: None,
            final_profit_percentage: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Signed profit in percent at `price`, rounded to 4 decimal places.
    pub fn profit_percentage(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let delta = match self.direction {
            Direction::Buy => price - self.entry_price,
            Direction::Sell => self.entry_price - price,
        };
        (delta / self.entry_price * Decimal::ONE_HUNDRED).round_dp(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy_intent() -> OrderIntent {
        OrderIntent {
            symbol: "btcusdt".to_string(),
            recommendation: Some(Recommendation::Buy),
            risk_level: Some(RiskLevel::Low),
            entry_price: Some(dec!(100)),
            stop_loss: Some(dec!(95)),
            targets: TakeProfitTargets::new(Some(dec!(105)), Some(dec!(110)), Some(dec!(120))),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_intent_normalizes_symbol() {
        let order = buy_intent().validate().unwrap();
        assert_eq!(order.symbol, "BTCUSDT");
        assert_eq!(order.direction, Direction::Buy);
        assert_eq!(order.interval, KlineInterval::M1);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let mut intent = buy_intent();
        intent.recommendation = None;
        assert!(matches!(intent.validate(), Err(DomainError::Validation(_))));

        let mut intent = buy_intent();
        intent.entry_price = None;
        assert!(intent.validate().is_err());

        let mut intent = buy_intent();
        intent.risk_level = None;
        assert!(intent.validate().is_err());
    }

    #[test]
    fn test_hold_and_high_risk_do_not_open() {
        let mut intent = buy_intent();
        intent.recommendation = Some(Recommendation::Hold);
        assert!(intent.validate().is_err());

        let mut intent = buy_intent();
        intent.risk_level = Some(RiskLevel::High);
        let err = intent.validate().unwrap_err();
        assert!(err.to_string().contains("HIGH"));
    }

    #[test]
    fn test_price_geometry() {
        let mut intent = buy_intent();
        intent.stop_loss = Some(dec!(0));
        assert!(intent.validate().is_err());

        let mut intent = buy_intent();
        intent.targets = TakeProfitTargets::new(Some(dec!(110)), Some(dec!(105)), None);
        assert!(intent.validate().is_err());

        let mut intent = buy_intent();
        intent.targets = TakeProfitTargets::new(Some(dec!(-1)), None, None);
        assert!(intent.validate().is_err());

        let sell = OrderIntent {
            symbol: "ETHUSDT".to_string(),
            recommendation: Some(Recommendation::Sell),
            risk_level: Some(RiskLevel::Medium),
            entry_price: Some(dec!(100)),
            stop_loss: Some(dec!(105)),
            targets: TakeProfitTargets::new(Some(dec!(95)), None, Some(dec!(80))),
            ..Default::default()
        };
        assert!(sell.validate().is_ok());
    }

    #[test]
    fn test_market_past_a_level_still_opens() {
        // Ticker already above T1: the order opens and the next sweep closes it.
        let mut intent = buy_intent();
        intent.entry_price = Some(dec!(106));
        let order = intent.validate().unwrap();
        assert_eq!(order.entry_price, dec!(106));

        // Ticker already through the stop.
        let mut intent = buy_intent();
        intent.entry_price = Some(dec!(94));
        assert!(intent.validate().is_ok());
    }

    #[test]
    fn test_best_first_skips_missing_levels() {
        let targets = TakeProfitTargets::new(Some(dec!(105)), None, Some(dec!(120)));
        let levels: Vec<_> = targets.best_first().map(|(level, _)| level).collect();
        assert_eq!(levels, vec![TargetLevel::T3, TargetLevel::T1]);
    }

    #[test]
    fn test_profit_percentage_by_direction() {
        let new = buy_intent().validate().unwrap();
        let mut order = Order::open(OrderId(1), new, Utc::now());
        assert_eq!(order.profit_percentage(dec!(110)), dec!(10));
        order.direction = Direction::Sell;
        assert_eq!(order.profit_percentage(dec!(110)), dec!(-10));
        assert_eq!(order.profit_percentage(dec!(97.5)), dec!(2.5));
    }
}
