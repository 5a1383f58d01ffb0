use crate::error::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CadenceUnit {
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl CadenceUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Minutes => "m",
            Self::Hours => "h",
        }
    }
}

/// Recurrence of a signal job, e.g. every 20 minutes or every 2 hours.
///
/// Firings are aligned on the wall clock: a `20m` job fires at :00, :20
/// and :40, a `2h` job at minute zero of every even hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobCadence {
    unit: CadenceUnit,
    value: u32,
}

impl JobCadence {
    pub fn new(unit: CadenceUnit, value: u32) -> DomainResult<Self> {
        let max = match unit {
            CadenceUnit::Minutes => 59,
            CadenceUnit::Hours => 23,
        };
        if value == 0 || value > max {
            return Err(DomainError::validation(format!(
                "cadence value must be within 1..={max}{}, got {value}",
                unit.suffix()
            )));
        }
        Ok(Self { unit, value })
    }

    pub fn minutes(value: u32) -> DomainResult<Self> {
        Self::new(CadenceUnit::Minutes, value)
    }

    pub fn hours(value: u32) -> DomainResult<Self> {
        Self::new(CadenceUnit::Hours, value)
    }

    pub fn unit(&self) -> CadenceUnit {
        self.unit
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn period(&self) -> Duration {
        let unit_secs = match self.unit {
            CadenceUnit::Minutes => 60,
            CadenceUnit::Hours => 3600,
        };
        Duration::from_secs(u64::from(self.value) * unit_secs)
    }

    pub fn label(&self) -> String {
        format!("{}{}", self.value, self.unit.suffix())
    }
}

impl fmt::Display for JobCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for JobCadence {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unknown = || DomainError::UnknownVariant {
            kind: "job cadence",
            value: s.to_string(),
        };
        let (digits, unit) = if let Some(digits) = s.strip_suffix('m') {
            (digits, CadenceUnit::Minutes)
        } else if let Some(digits) = s.strip_suffix('h') {
            (digits, CadenceUnit::Hours)
        } else {
            return Err(unknown());
        };
        let value = digits.parse::<u32>().map_err(|_| unknown())?;
        Self::new(unit, value)
    }
}

impl TryFrom<String> for JobCadence {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobCadence> for String {
    fn from(value: JobCadence) -> Self {
        value.label()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deterministic id for a symbol and cadence, so registering the same
    /// pair twice targets the same job.
    pub fn derive(symbol: &str, cadence: &JobCadence) -> Self {
        Self(format!(
            "signal_{}_{}",
            symbol.trim().to_ascii_lowercase(),
            cadence.label()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_parsing() {
        let cadence: JobCadence = "20m".parse().unwrap();
        assert_eq!(cadence.unit(), CadenceUnit::Minutes);
        assert_eq!(cadence.period(), Duration::from_secs(1200));

        let cadence: JobCadence = " 2h ".parse().unwrap();
        assert_eq!(cadence.period(), Duration::from_secs(7200));
        assert_eq!(cadence.to_string(), "2h");

        assert!("0m".parse::<JobCadence>().is_err());
        assert!("60m".parse::<JobCadence>().is_err());
        assert!("5d".parse::<JobCadence>().is_err());
        assert!("xm".parse::<JobCadence>().is_err());
    }

    #[test]
    fn test_job_id_is_deterministic() {
        let cadence = JobCadence::minutes(20).unwrap();
        let a = JobId::derive("BTCUSDT", &cadence);
        let b = JobId::derive(" btcusdt", &cadence);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "signal_btcusdt_20m");
        assert_ne!(a, JobId::derive("BTCUSDT", &JobCadence::hours(1).unwrap()));
    }

    #[test]
    fn test_cadence_serde_roundtrip_through_label() {
        let cadence = JobCadence::hours(4).unwrap();
        let json = serde_json::to_string(&cadence).unwrap();
        assert_eq!(json, "\"4h\"");
        assert!(serde_json::from_str::<JobCadence>("\"0h\"").is_err());
    }
}
