//! Runtime configuration read from the environment.

use alphapulse_execution::prelude::{EngineConfig, SignalJobSpec};
use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BINANCE_URL: &str = "https://fapi.binance.com";
const DEFAULT_SIGNAL_SERVICE_URL: &str = "http://localhost:8000";

/// Settings of the `alphapulse` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// PostgreSQL URL. Without it orders live in memory only.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub binance_base_url: String,
    pub signal_service_url: String,
    /// Group-bot webhook. Alerts only go to the log without it.
    pub notify_webhook_url: Option<String>,
    /// Signing secret of the webhook, when the bot requires signed posts.
    pub notify_webhook_secret: Option<String>,
    pub call_timeout: Duration,
    pub signal_timeout: Duration,
    pub sweep_concurrency: usize,
    pub persist_attempts: u32,
    pub log_level: String,
    pub log_json: bool,
    /// JSON array of signal jobs registered by `run`.
    pub jobs_file: Option<PathBuf>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns an error when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            database_url: text("DATABASE_URL"),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            binance_base_url: text("BINANCE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BINANCE_URL.to_string()),
            signal_service_url: text("SIGNAL_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_SIGNAL_SERVICE_URL.to_string()),
            notify_webhook_url: text("NOTIFY_WEBHOOK_URL"),
            notify_webhook_secret: text("NOTIFY_WEBHOOK_SECRET"),
            call_timeout: Duration::from_secs(parse_or(&lookup, "CALL_TIMEOUT_SECS", 10)?),
            signal_timeout: Duration::from_secs(parse_or(&lookup, "SIGNAL_TIMEOUT_SECS", 200)?),
            sweep_concurrency: parse_or(&lookup, "SWEEP_CONCURRENCY", 8)?,
            persist_attempts: parse_or(&lookup, "PERSIST_ATTEMPTS", 3)?,
            log_level: text("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: parse_or(&lookup, "LOG_JSON", false)?,
            jobs_file: text("JOBS_FILE").map(PathBuf::from),
        };

        anyhow::ensure!(config.sweep_concurrency > 0, "SWEEP_CONCURRENCY must be at least 1");
        anyhow::ensure!(config.persist_attempts > 0, "PERSIST_ATTEMPTS must be at least 1");
        Ok(config)
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default();
        engine.lifecycle.call_timeout = self.call_timeout;
        engine.lifecycle.notify_timeout = self.call_timeout;
        engine.lifecycle.persist_attempts = self.persist_attempts;
        engine.tracker.call_timeout = self.call_timeout;
        engine.tracker.sweep_concurrency = self.sweep_concurrency;
        engine.signals.call_timeout = self.call_timeout;
        engine.signals.notify_timeout = self.call_timeout;
        engine.signals.signal_timeout = self.signal_timeout;
        engine
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}

/// Loads signal job definitions from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a JSON array of jobs.
pub fn load_jobs(path: &Path) -> Result<Vec<SignalJobSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read jobs file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid jobs file {}", path.display()))
}
