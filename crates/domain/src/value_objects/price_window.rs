use crate::error::{DomainError, DomainResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// High/low/close range observed over one sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceWindow {
    pub low: Decimal,
    pub high: Decimal,
    pub close: Decimal,
}

impl PriceWindow {
    pub fn new(low: Decimal, high: Decimal, close: Decimal) -> DomainResult<Self> {
        if low <= Decimal::ZERO || low > high || close < low || close > high {
            return Err(DomainError::validation(format!(
                "inconsistent price window low={low} high={high} close={close}"
            )));
        }
        Ok(Self { low, high, close })
    }

    /// Degenerate window for a single observed price.
    pub fn at(price: Decimal) -> DomainResult<Self> {
        Self::new(price, price, price)
    }

    /// Widens the window to cover `other`, taking its close.
    #[must_use]
    pub fn merge(self, other: PriceWindow) -> Self {
        Self {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
            close: other.close,
        }
    }
}
