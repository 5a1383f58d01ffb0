use crate::entities::order::{OrderIntent, TakeProfitTargets};
use crate::enums::{KlineInterval, Recommendation, RiskLevel, TargetLevel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters forwarded to the signal generator on every firing of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    pub service: String,
    pub model: Option<String>,
    pub interval: KlineInterval,
    pub klines_count: u32,
    pub temperature: f64,
    pub max_tokens: u32,
    pub enable_thinking: bool,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            service: "guiji".to_string(),
            model: None,
            interval: KlineInterval::H1,
            klines_count: 100,
            temperature: 0.7,
            max_tokens: 16389,
            enable_thinking: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTarget {
    pub level: TargetLevel,
    pub price: Decimal,
}

/// Recommendation returned by the signal generator, already parsed into
/// closed variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
    pub entry_price_min: Option<Decimal>,
    pub entry_price_max: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub targets: Vec<SignalTarget>,
    pub position_size_percentage: Option<Decimal>,
    pub analysis_summary: Option<String>,
}

impl TradingSignal {
    /// Entry suggested by the signal itself, used when no market price is
    /// available.
    pub fn suggested_entry(&self) -> Option<Decimal> {
        self.entry_price_min
            .filter(|p| !p.is_zero())
            .or(self.entry_price_max.filter(|p| !p.is_zero()))
    }

    pub fn targets(&self) -> TakeProfitTargets {
        let mut targets = TakeProfitTargets::default();
        for level in [TargetLevel::T1, TargetLevel::T2, TargetLevel::T3] {
            // first occurrence of a level wins
            if let Some(target) = self.targets.iter().find(|t| t.level == level) {
                targets.set(level, target.price);
            }
        }
        targets
    }

    pub fn into_intent(self, entry_price: Option<Decimal>, params: &SignalParams) -> OrderIntent {
        let targets = self.targets();
        let entry_price = entry_price.or_else(|| self.suggested_entry());
        OrderIntent {
            symbol: self.symbol,
            interval: Some(params.interval),
            ai_model: params.model.clone(),
            recommendation: Some(self.recommendation),
            risk_level: Some(self.risk_level),
            entry_price,
            stop_loss: self.stop_loss,
            targets,
            position_size_percentage: self.position_size_percentage,
            analysis_summary: self.analysis_summary,
        }
    }
}
