//! Binance USDⓈ-M futures market data.

use super::{check_status, parse_decimal, request_error};
use alphapulse_domain::enums::KlineInterval;
use alphapulse_domain::value_objects::PriceWindow;
use alphapulse_execution::ports::{PriceSource, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Public futures REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// [`PriceSource`] backed by the Binance futures REST API.
///
/// Windows are built from the last `lookback` klines, including the one
/// still forming, so the high and low cover every trade since it opened.
#[derive(Debug, Clone)]
pub struct BinancePriceSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BinancePriceSource {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        check_status(response)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| request_error(e, self.timeout))
    }
}

#[async_trait]
impl PriceSource for BinancePriceSource {
    async fn current_price(&self, symbol: &str) -> Result<Decimal, SourceError> {
        let body = self
            .get("/fapi/v1/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        let price = body
            .get("price")
            .ok_or_else(|| SourceError::InvalidResponse(format!("ticker without price: {body}")))
            .and_then(parse_decimal)?;
        if price <= Decimal::ZERO {
            return Err(SourceError::InvalidResponse(format!(
                "{symbol}: non-positive ticker price {price}"
            )));
        }
        Ok(price)
    }

    async fn range(
        &self,
        symbol: &str,
        interval: KlineInterval,
        lookback: u32,
    ) -> Result<PriceWindow, SourceError> {
        let limit = lookback.max(1);
        let body = self
            .get(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let klines: Vec<Vec<Value>> = serde_json::from_value(body)
            .map_err(|e| SourceError::InvalidResponse(format!("malformed klines: {e}")))?;
        debug!(symbol, %interval, count = klines.len(), "Fetched klines");
        window_from_klines(&klines)
    }
}

/// Reads high/low/close from one kline row
/// `[open_time, open, high, low, close, volume, ...]`.
fn parse_kline(kline: &[Value]) -> Result<PriceWindow, SourceError> {
    if kline.len() < 5 {
        return Err(SourceError::InvalidResponse(format!(
            "kline has {} fields, expected at least 5",
            kline.len()
        )));
    }
    let high = parse_decimal(&kline[2])?;
    let low = parse_decimal(&kline[3])?;
    let close = parse_decimal(&kline[4])?;
    PriceWindow::new(low, high, close).map_err(|e| SourceError::InvalidResponse(e.to_string()))
}

/// Merges consecutive klines, oldest first, into one window.
fn window_from_klines(klines: &[Vec<Value>]) -> Result<PriceWindow, SourceError> {
    let mut rows = klines.iter();
    let first = rows
        .next()
        .ok_or_else(|| SourceError::InvalidResponse("no klines returned".to_string()))?;
    rows.try_fold(parse_kline(first)?, |window, kline| {
        Ok(window.merge(parse_kline(kline)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn kline(high: &str, low: &str, close: &str) -> Vec<Value> {
        vec![
            json!(1_700_000_000_000_i64),
            json!("100.0"),
            json!(high),
            json!(low),
            json!(close),
            json!("1234.5"),
            json!(1_700_000_059_999_i64),
        ]
    }

    #[test]
    fn test_parse_kline_reads_high_low_close() {
        let window = parse_kline(&kline("110.5", "94.2", "101.0")).unwrap();
        assert_eq!(window.high, dec!(110.5));
        assert_eq!(window.low, dec!(94.2));
        assert_eq!(window.close, dec!(101.0));
    }

    #[test]
    fn test_parse_kline_rejects_short_rows() {
        let short = vec![json!(0), json!("1"), json!("2")];
        assert!(matches!(
            parse_kline(&short),
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_kline_rejects_inverted_range() {
        assert!(parse_kline(&kline("90", "110", "100")).is_err());
    }

    #[test]
    fn test_window_spans_all_klines() {
        let klines = vec![
            kline("105", "98", "104"),
            kline("112", "101", "108"),
            kline("109", "96", "97"),
        ];
        let window = window_from_klines(&klines).unwrap();
        assert_eq!(window.low, dec!(96));
        assert_eq!(window.high, dec!(112));
        assert_eq!(window.close, dec!(97));
    }

    #[test]
    fn test_empty_klines_is_invalid() {
        assert!(matches!(
            window_from_klines(&[]),
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let source = BinancePriceSource::new("https://example.test/", Duration::from_secs(5)).unwrap();
        assert_eq!(source.base_url, "https://example.test");
    }
}
