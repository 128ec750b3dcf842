//! JSON webhook alert delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{truncate_chars, AlertSink, SinkError};
use crate::monitor::report::{Report, Severity};

/// Body of the webhook POST.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    /// Prefixed subject.
    pub subject: &'a str,
    /// Report urgency.
    pub severity: Severity,
    /// Plain-text rendering.
    pub text: String,
    /// HTML rendering.
    pub html: String,
    /// Structured report.
    pub report: &'a Report,
}

/// Upper bound on one webhook delivery, connect through response body.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts each alert as JSON to a fixed URL.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl WebhookSink {
    /// Create a sink with an optional bearer token.
    pub fn new(client: reqwest::Client, url: String, token: Option<String>) -> Self {
        Self {
            client,
            url,
            token,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-delivery timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, subject: &str, report: &Report) -> Result<(), SinkError> {
        let payload = WebhookPayload {
            subject,
            severity: report.severity,
            text: report.to_text(),
            html: report.to_html(),
            report,
        };

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body: truncate_chars(&body, 200),
        })
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
