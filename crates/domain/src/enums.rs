use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Recommendation produced by the signal generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl Recommendation {
    /// Direction an order would take, `None` for `Hold`.
    #[must_use]
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Buy => Some(Direction::Buy),
            Self::Sell => Some(Direction::Sell),
            Self::Hold => None,
        }
    }
}

impl FromStr for Recommendation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Self::Buy),
            "SELL" | "SHORT" => Ok(Self::Sell),
            "HOLD" => Ok(Self::Hold),
            _ => Err(DomainError::UnknownVariant {
                kind: "recommendation",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Recommendation::from_str(s)?.direction() {
            Some(direction) => Ok(direction),
            None => Err(DomainError::UnknownVariant {
                kind: "direction",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Only low and medium risk signals may open an order automatically.
    #[must_use]
    pub fn permits_auto_open(self) -> bool {
        matches!(self, Self::Low | Self::Medium)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(DomainError::UnknownVariant {
                kind: "risk level",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetLevel {
    T1,
    T2,
    T3,
}

impl TargetLevel {
    /// Scan order used by trigger evaluation: highest reward first.
    pub const BEST_FIRST: [TargetLevel; 3] = [Self::T3, Self::T2, Self::T1];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::T3 => "T3",
        }
    }

    #[must_use]
    pub fn status(self) -> OrderStatus {
        match self {
            Self::T1 => OrderStatus::TakeProfitT1,
            Self::T2 => OrderStatus::TakeProfitT2,
            Self::T3 => OrderStatus::TakeProfitT3,
        }
    }
}

impl fmt::Display for TargetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "T1" => Ok(Self::T1),
            "T2" => Ok(Self::T2),
            "T3" => Ok(Self::T3),
            _ => Err(DomainError::UnknownVariant {
                kind: "target level",
                value: s.to_string(),
            }),
        }
    }
}

/// Order state. `Open` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    StopLoss,
    TakeProfitT1,
    TakeProfitT2,
    TakeProfitT3,
    Closed,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::StopLoss => "STOP_LOSS",
            Self::TakeProfitT1 => "TAKE_PROFIT_T1",
            Self::TakeProfitT2 => "TAKE_PROFIT_T2",
            Self::TakeProfitT3 => "TAKE_PROFIT_T3",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OPEN" => Ok(Self::Open),
            "STOP_LOSS" => Ok(Self::StopLoss),
            "TAKE_PROFIT_T1" => Ok(Self::TakeProfitT1),
            "TAKE_PROFIT_T2" => Ok(Self::TakeProfitT2),
            "TAKE_PROFIT_T3" => Ok(Self::TakeProfitT3),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(DomainError::UnknownVariant {
                kind: "order status",
                value: s.to_string(),
            }),
        }
    }
}

/// Exchange kline interval used when sampling a price window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KlineInterval {
    #[default]
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
}

impl KlineInterval {
    pub const ALL: [KlineInterval; 12] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KlineInterval {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "kline interval",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for KlineInterval {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KlineInterval> for String {
    fn from(value: KlineInterval) -> Self {
        value.as_str().to_string()
    }
}

/// Named cadence that produced a tracking sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingCadence {
    Realtime,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    Manual,
}

impl TrackingCadence {
    /// Cadences driven by the profit tracker's timers.
    pub const SCHEDULED: [TrackingCadence; 6] = [
        Self::Realtime,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::FourHours,
        Self::SixHours,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::SixHours => "6h",
            Self::Manual => "manual",
        }
    }

    /// Timer period, `None` for `Manual`.
    #[must_use]
    pub fn period(self) -> Option<Duration> {
        let minutes = match self {
            Self::Realtime => 1,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::TwoHours => 120,
            Self::FourHours => 240,
            Self::SixHours => 360,
            Self::Manual => return None,
        };
        Some(Duration::from_secs(minutes * 60))
    }

    /// Kline interval sampled by a fixed cadence. Realtime sweeps use each
    /// order's own sub-interval and manual recomputes use the ticker price.
    #[must_use]
    pub fn kline_interval(self) -> Option<KlineInterval> {
        match self {
            Self::ThirtyMinutes => Some(KlineInterval::M30),
            Self::OneHour => Some(KlineInterval::H1),
            Self::TwoHours => Some(KlineInterval::H2),
            Self::FourHours => Some(KlineInterval::H4),
            Self::SixHours => Some(KlineInterval::H6),
            Self::Realtime | Self::Manual => None,
        }
    }
}

impl fmt::Display for TrackingCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TrackingCadence {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::SCHEDULED
            .into_iter()
            .chain(std::iter::once(Self::Manual))
            .find(|cadence| cadence.label() == s)
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "tracking cadence",
                value: s.to_string(),
            })
    }
}
