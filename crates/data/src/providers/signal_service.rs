//! Client for the AI trader analysis service.

use super::{check_status, parse_decimal, request_error};
use alphapulse_domain::entities::{SignalParams, SignalTarget, TradingSignal};
use alphapulse_domain::enums::{Recommendation, RiskLevel, TargetLevel};
use alphapulse_execution::ports::{SignalGenerator, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Request body of `POST /api/ai/chat/trader`.
#[derive(Debug, Serialize)]
struct TraderRequest<'a> {
    service: &'a str,
    model: Option<&'a str>,
    messages: Vec<Value>,
    temperature: f64,
    max_tokens: u32,
    enable_thinking: bool,
    klines_count: u32,
    #[serde(rename = "is_Trader")]
    is_trader: bool,
    symbol: &'a str,
    interval: &'a str,
}

impl<'a> TraderRequest<'a> {
    fn new(symbol: &'a str, params: &'a SignalParams) -> Self {
        Self {
            service: &params.service,
            model: params.model.as_deref(),
            messages: Vec::new(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            enable_thinking: params.enable_thinking,
            klines_count: params.klines_count,
            is_trader: true,
            symbol,
            interval: params.interval.as_str(),
        }
    }
}

/// Structured analysis as produced by the service. Prices may arrive as
/// strings or numbers.
#[derive(Debug, Deserialize)]
struct TraderOutput {
    recommendation: String,
    risk_level: String,
    #[serde(default)]
    entry_price_min: Option<Value>,
    #[serde(default)]
    entry_price_max: Option<Value>,
    #[serde(default)]
    stop_loss: Option<Value>,
    #[serde(default)]
    targets: Vec<TargetOutput>,
    #[serde(default)]
    position_size_percentage: Option<Value>,
    #[serde(default)]
    analysis_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TargetOutput {
    level: String,
    price: Value,
}

/// [`SignalGenerator`] that asks the remote trader endpoint for a fresh
/// analysis of one symbol.
#[derive(Debug, Clone)]
pub struct HttpSignalGenerator {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSignalGenerator {
    /// Creates a client. `timeout` bounds one analysis request, which can
    /// take minutes for large models.
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
}

#[async_trait]
impl SignalGenerator for HttpSignalGenerator {
    async fn analyze(
        &self,
        symbol: &str,
        params: &SignalParams,
    ) -> Result<TradingSignal, SourceError> {
        let url = format!("{}/api/ai/chat/trader", self.base_url);
        debug!(symbol, service = %params.service, interval = %params.interval, "Requesting analysis");
        let response = self
            .client
            .post(&url)
            .json(&TraderRequest::new(symbol, params))
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        let body = check_status(response)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        parse_signal(symbol, body)
    }
}

/// Accepts the analysis object itself or a chat envelope whose `content`
/// holds it as JSON text.
fn parse_signal(symbol: &str, body: Value) -> Result<TradingSignal, SourceError> {
    let body = match body.get("content").and_then(Value::as_str) {
        Some(content) => serde_json::from_str(strip_code_fence(content))
            .map_err(|e| SourceError::InvalidResponse(format!("content is not JSON: {e}")))?,
        None => body,
    };
    let output: TraderOutput = serde_json::from_value(body)
        .map_err(|e| SourceError::InvalidResponse(format!("unexpected analysis shape: {e}")))?;
    output.into_signal(symbol)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim)
}

impl TraderOutput {
    fn into_signal(self, symbol: &str) -> Result<TradingSignal, SourceError> {
        let recommendation: Recommendation = self
            .recommendation
            .parse()
            .map_err(|e| SourceError::InvalidResponse(format!("{e}")))?;
        let risk_level: RiskLevel = self
            .risk_level
            .parse()
            .map_err(|e| SourceError::InvalidResponse(format!("{e}")))?;

        let mut targets = Vec::with_capacity(self.targets.len());
        for target in self.targets {
            match target.level.parse::<TargetLevel>() {
                Ok(level) => targets.push(SignalTarget {
                    level,
                    price: parse_decimal(&target.price)?,
                }),
                Err(_) => warn!(symbol, level = %target.level, "Ignoring unknown target level"),
            }
        }

        Ok(TradingSignal {
            symbol: symbol.to_ascii_uppercase(),
            recommendation,
            risk_level,
            entry_price_min: optional_decimal(self.entry_price_min)?,
            entry_price_max: optional_decimal(self.entry_price_max)?,
            stop_loss: optional_decimal(self.stop_loss)?,
            targets,
            position_size_percentage: optional_decimal(self.position_size_percentage)?,
            analysis_summary: self.analysis_summary,
        })
    }
}

fn optional_decimal(value: Option<Value>) -> Result<Option<Decimal>, SourceError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_decimal(&v).map(Some),
    }
}
