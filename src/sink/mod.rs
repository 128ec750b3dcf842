//! Alert sinks and the notifier that fronts them.
//!
//! Sinks deliver a subject plus a structured [`Report`]. The [`Notifier`]
//! owns the enable switch, subject prefixing, host facts, and failure
//! containment: a sink error is logged and never reaches the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

pub mod log;
pub mod telegram;
pub mod webhook;

pub use self::log::LogSink;
pub use self::telegram::TelegramSink;
pub use self::webhook::WebhookSink;

use crate::config::AlertsConfig;
use crate::credentials::Credentials;
use crate::monitor::report::{format_uptime, Report};
use crate::sampler::{HostInfo, ResourceSampler};

/// Errors produced by alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The request never reached the remote end.
    #[error("alert transport failed: {0}")]
    Transport(String),
    /// The remote end refused the alert.
    #[error("alert rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// Every recipient failed.
    #[error("failed to deliver alert to any recipient")]
    NoRecipients,
}

/// External channel that delivers human-readable notifications.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert.
    async fn send(&self, subject: &str, report: &Report) -> Result<(), SinkError>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

/// Enable-gated fan-out over alert sinks.
#[derive(Clone)]
pub struct Notifier {
    sinks: Vec<Arc<dyn AlertSink>>,
    enabled: bool,
    prefix: String,
    sampler: Option<Arc<dyn ResourceSampler>>,
}

impl Notifier {
    /// Create a notifier over the given sinks.
    pub fn new(enabled: bool, prefix: String, sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self {
            sinks,
            enabled,
            prefix,
            sampler: None,
        }
    }

    /// A notifier that never sends anything.
    pub fn disabled() -> Self {
        Self::new(false, String::new(), Vec::new())
    }

    /// Include live CPU/memory readings in the host facts.
    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn ResourceSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Build from configuration, resolving secrets from `credentials`.
    ///
    /// Falls back to a [`LogSink`] when alerts are enabled but no remote
    /// sink is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled sink is missing its secret.
    pub fn from_config(
        config: &AlertsConfig,
        credentials: &Credentials,
        client: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();

        if config.enabled {
            if let Some(telegram) = &config.telegram {
                let token = credentials.require(&telegram.bot_token_env)?;
                sinks.push(Arc::new(TelegramSink::new(
                    &token,
                    telegram.notify_users.clone(),
                )));
            }
            if let Some(webhook) = &config.webhook {
                let token = match &webhook.token_env {
                    Some(env) => Some(credentials.require(env)?),
                    None => None,
                };
                sinks.push(Arc::new(WebhookSink::new(
                    client,
                    webhook.url.clone(),
                    token,
                )));
            }
            if sinks.is_empty() {
                info!("alerts enabled without a remote sink, alerts go to the log only");
                sinks.push(Arc::new(LogSink));
            }
        }

        Ok(Self::new(config.enabled, config.subject_prefix.clone(), sinks))
    }

    /// Whether alerts are delivered at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.sinks.is_empty()
    }

    /// Deliver a report to every sink.
    ///
    /// Returns `true` when at least one sink accepted it. Failures are
    /// logged; nothing is propagated.
    pub async fn notify(&self, subject: &str, mut report: Report) -> bool {
        if !self.is_enabled() {
            debug!(subject = %subject, "alerts disabled, not sending");
            return false;
        }

        let full_subject = if self.prefix.is_empty() {
            subject.to_owned()
        } else {
            format!("{} {subject}", self.prefix)
        };
        report.facts = self.host_facts().await;

        let mut delivered = false;
        for sink in &self.sinks {
            match sink.send(&full_subject, &report).await {
                Ok(()) => {
                    delivered = true;
                    info!(sink = sink.name(), subject = %full_subject, "alert sent");
                }
                Err(e) => {
                    warn!(sink = sink.name(), subject = %full_subject, error = %e, "failed to send alert");
                }
            }
        }
        delivered
    }

    async fn host_facts(&self) -> Vec<(String, String)> {
        let host = HostInfo::current();
        let mut facts = vec![
            ("Host".to_owned(), host.host),
            ("Platform".to_owned(), host.platform),
        ];
        if let Some(sampler) = &self.sampler {
            if let Ok(memory) = sampler.memory_percent().await {
                facts.push(("Memory Usage".to_owned(), format!("{memory:.2}%")));
            }
            if let Ok(cpu) = sampler.last_cpu_percent().await {
                facts.push(("CPU Usage".to_owned(), format!("{cpu:.2}%")));
            }
        }
        facts.push(("Uptime".to_owned(), format_uptime(host.uptime_secs)));
        facts
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &text[..idx]),
        None => text.to_owned(),
    }
}
