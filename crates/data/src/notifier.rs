//! Chat-bot webhook alerts.

use alphapulse_execution::ports::{Notifier, NotifyError};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Posts alerts as text messages to a group-bot webhook
/// (`{"msgtype":"text","text":{"content":...}}`).
///
/// With a signing secret, every post carries `timestamp` (milliseconds) and
/// `sign` query parameters, where `sign` is the base64 HMAC-SHA256 of
/// `"{timestamp}\n{secret}"` keyed by the secret.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Url,
    secret: Option<String>,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let url = Url::parse(url).map_err(|e| NotifyError(format!("invalid webhook URL: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            secret: None,
        })
    }

    /// Signs every post with `secret`.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// URL of a post sent at `timestamp_ms`.
    fn signed_url(&self, timestamp_ms: i64) -> Result<Url, NotifyError> {
        let mut url = self.url.clone();
        if let Some(secret) = &self.secret {
            let timestamp = timestamp_ms.to_string();
            let sign = sign(secret, &timestamp)?;
            url.query_pairs_mut()
                .append_pair("timestamp", &timestamp)
                .append_pair("sign", &sign);
        }
        Ok(url)
    }
}

/// Base64 HMAC-SHA256 of `"{timestamp}\n{secret}"` keyed by `secret`.
fn sign(secret: &str, timestamp: &str) -> Result<String, NotifyError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NotifyError(format!("invalid signing key: {e}")))?;
    mac.update(format!("{timestamp}\n{secret}").as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let url = self.signed_url(Utc::now().timestamp_millis())?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "msgtype": "text", "text": { "content": text } }))
            .send()
            .await
            .map_err(|e| NotifyError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError(format!("webhook answered HTTP {status}: {body}")));
        }
        debug!(signed = self.secret.is_some(), "Webhook alert delivered");
        Ok(())
    }
}
