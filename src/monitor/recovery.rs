//! Recovery controller: bounded-retry restarts of unhealthy targets.
//!
//! Attempts for one target run sequentially and stop at the first restart
//! the controller reports as successful. Different targets recover
//! concurrently, capped by a semaphore so the supervisor is not flooded.
//! Whether a target actually recovered is decided by the caller's single
//! confirmation probe, not by these outcomes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::probe::ProbeResult;
use crate::config::RecoveryConfig;
use crate::controller::{ControllerError, ProcessController};

/// Result of one restart attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryOutcome {
    /// Target name.
    pub target: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether the controller reported success.
    pub success: bool,
    /// Controller error, on failure.
    pub error: Option<String>,
}

/// Limits applied to recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Maximum attempts per target per tick.
    pub retry_ceiling: u32,
    /// Maximum targets restarting at once.
    pub max_concurrent: usize,
    /// Upper bound for one restart call.
    pub restart_timeout: Duration,
    /// Pause after a failed attempt before the next one.
    pub retry_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            retry_ceiling: 3,
            max_concurrent: 2,
            restart_timeout: Duration::from_secs(30),
            retry_delay: Duration::ZERO,
        }
    }
}

impl From<&RecoveryConfig> for RecoveryPolicy {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            retry_ceiling: config.retry_ceiling.max(1),
            max_concurrent: config.max_concurrent_restarts.max(1),
            restart_timeout: Duration::from_secs(config.restart_timeout_secs),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Drives restarts through a [`ProcessController`].
pub struct RecoveryController {
    controller: Arc<dyn ProcessController>,
    policy: RecoveryPolicy,
    permits: Arc<Semaphore>,
}

impl RecoveryController {
    /// Create a recovery controller.
    pub fn new(controller: Arc<dyn ProcessController>, policy: RecoveryPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.max_concurrent.max(1)));
        Self {
            controller,
            policy,
            permits,
        }
    }

    /// The active policy.
    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    /// Attempt recovery for every unhealthy result.
    ///
    /// Healthy results and duplicate target names are ignored. Returns every
    /// attempt's outcome, grouped by target in input order. Never fails:
    /// exhausting the retry ceiling is logged and reflected in the outcomes.
    pub async fn recover(&self, unhealthy: &[ProbeResult]) -> Vec<RecoveryOutcome> {
        let mut seen = BTreeSet::new();
        let names: Vec<&str> = unhealthy
            .iter()
            .filter(|result| !result.healthy)
            .map(|result| result.target.as_str())
            .filter(|name| seen.insert(*name))
            .collect();

        join_all(names.into_iter().map(|name| self.recover_target(name)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Run the retry sequence for a single target.
    pub async fn recover_target(&self, name: &str) -> Vec<RecoveryOutcome> {
        let mut outcomes = Vec::new();

        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(target = %name, error = %e, "recovery permits closed, skipping target");
                return outcomes;
            }
        };

        let ceiling = self.policy.retry_ceiling.max(1);
        for attempt in 1..=ceiling {
            let result =
                match tokio::time::timeout(self.policy.restart_timeout, self.controller.restart(name))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ControllerError::Timeout {
                        seconds: self.policy.restart_timeout.as_secs(),
                    }),
                };

            match result {
                Ok(output) => {
                    info!(
                        target = %name,
                        attempt,
                        controller = self.controller.kind(),
                        output = %output,
                        "restart succeeded"
                    );
                    outcomes.push(RecoveryOutcome {
                        target: name.to_owned(),
                        attempt,
                        success: true,
                        error: None,
                    });
                    return outcomes;
                }
                Err(e) => {
                    warn!(target = %name, attempt, error = %e, "restart attempt failed");
                    outcomes.push(RecoveryOutcome {
                        target: name.to_owned(),
                        attempt,
                        success: false,
                        error: Some(e.to_string()),
                    });
                    if attempt < ceiling && !self.policy.retry_delay.is_zero() {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        warn!(target = %name, attempts = ceiling, "restart retries exhausted");
        outcomes
    }
}
