//! HTTP clients for market data and trading signals.

mod binance;
mod signal_service;

pub use binance::BinancePriceSource;
pub use signal_service::HttpSignalGenerator;

use alphapulse_execution::ports::SourceError;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Parses a decimal that may be encoded as a JSON string or number.
pub(crate) fn parse_decimal(value: &Value) -> Result<Decimal, SourceError> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim())
            .map_err(|e| SourceError::InvalidResponse(format!("invalid decimal {s:?}: {e}"))),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| SourceError::InvalidResponse(format!("invalid decimal {n}: {e}"))),
        other => Err(SourceError::InvalidResponse(format!(
            "expected decimal, got {other}"
        ))),
    }
}

/// Maps a transport failure onto the port's error kinds.
pub(crate) fn request_error(err: reqwest::Error, timeout: Duration) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(timeout)
    } else if err.is_decode() {
        SourceError::InvalidResponse(err.to_string())
    } else {
        SourceError::Unavailable(err.to_string())
    }
}

/// Turns a non-success response into [`SourceError::Unavailable`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::Unavailable(format!("HTTP {status}: {body}")))
}
