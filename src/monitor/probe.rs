//! Probe executor: one HTTP health check per target.
//!
//! A probe is healthy only when the response status equals the target's
//! expected status exactly. Every other outcome (other status, timeout,
//! transport error) is unhealthy and carries an error description.

use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use super::state::HealthStore;
use super::target::Target;

/// Outcome of a single probe. Lives for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    /// Target name.
    pub target: String,
    /// Probed URL.
    pub url: String,
    /// Whether the expected status was returned.
    pub healthy: bool,
    /// Request latency, on success.
    pub response_time_ms: Option<u64>,
    /// Failure description, on failure.
    pub error: Option<String>,
    /// Consecutive failures including this probe.
    pub failure_count: u32,
    /// When the probe completed.
    pub checked_at: DateTime<Utc>,
}

/// Issues health checks over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    /// Create a prober with a fresh client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. no TLS backend).
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Create a prober over an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Probe one target.
    ///
    /// `previous_failures` is the target's consecutive failure count before
    /// this probe; the result carries 0 on success or `previous + 1`.
    pub async fn check(&self, target: &Target, previous_failures: u32) -> ProbeResult {
        let start = Instant::now();

        let mut request = self
            .client
            .request(target.method.clone(), target.url.clone())
            .timeout(target.timeout);
        for (key, value) in &target.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &target.body {
            request = request.body(body.clone());
        }

        let outcome = match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() == target.expected_status {
                    // Latency covers the full body, not just the headers.
                    match response.bytes().await {
                        Ok(_) => Ok(start.elapsed()),
                        Err(e) => Err(describe_error(&e, target)),
                    }
                } else {
                    Err(format!(
                        "unexpected status {status} (expected {})",
                        target.expected_status
                    ))
                }
            }
            Err(e) => Err(describe_error(&e, target)),
        };

        let checked_at = Utc::now();
        match outcome {
            Ok(elapsed) => {
                let response_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                debug!(target = %target.name, response_time_ms, "probe healthy");
                ProbeResult {
                    target: target.name.clone(),
                    url: target.url.to_string(),
                    healthy: true,
                    response_time_ms: Some(response_time_ms),
                    error: None,
                    failure_count: 0,
                    checked_at,
                }
            }
            Err(error) => {
                let failure_count = previous_failures.saturating_add(1);
                warn!(target = %target.name, failure_count, error = %error, "probe unhealthy");
                ProbeResult {
                    target: target.name.clone(),
                    url: target.url.to_string(),
                    healthy: false,
                    response_time_ms: None,
                    error: Some(error),
                    failure_count,
                    checked_at,
                }
            }
        }
    }

    /// Probe every target concurrently and wait for all of them.
    ///
    /// Previous failure counts are read from `store`. Results come back in
    /// the same order as `targets`; one failing probe never cancels another.
    pub async fn check_all<'a, I>(&self, targets: I, store: &HealthStore) -> Vec<ProbeResult>
    where
        I: IntoIterator<Item = &'a Target>,
    {
        join_all(
            targets
                .into_iter()
                .map(|target| self.check(target, store.failures(&target.name))),
        )
        .await
    }
}

fn describe_error(error: &reqwest::Error, target: &Target) -> String {
    if error.is_timeout() {
        let ms = u64::try_from(target.timeout.as_millis()).unwrap_or(u64::MAX);
        format!("request timed out after {ms}ms")
    } else {
        error.to_string()
    }
}
