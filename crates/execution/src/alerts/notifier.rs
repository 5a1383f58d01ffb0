//! Notifier implementations.

use crate::ports::{Notifier, NotifyError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Writes alerts to the log.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!(alert = %text, "Alert");
        Ok(())
    }
}

/// Sends every alert to all inner notifiers.
///
/// Fails only when every notifier failed.
#[derive(Default, Clone)]
pub struct MultiNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl MultiNotifier {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a notifier.
    #[must_use]
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Number of inner notifiers.
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Whether no notifier is registered.
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.send(text).await {
                failures.push(e.0);
            }
        }
        if !self.notifiers.is_empty() && failures.len() == self.notifiers.len() {
            return Err(NotifyError(failures.join("; ")));
        }
        Ok(())
    }
}

/// Delivers an alert, logging and swallowing any failure or timeout.
pub async fn notify_best_effort(notifier: &dyn Notifier, text: &str, timeout: Duration) {
    match tokio::time::timeout(timeout, notifier.send(text)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Alert delivery failed"),
        Err(_) => warn!(timeout = ?timeout, "Alert delivery timed out"),
    }
}
