//! Resource watcher: CPU/memory threshold alerts.
//!
//! Thresholds are strict (`>`); a reading equal to the threshold does not
//! alert. A persisting breach re-alerts on every tick.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ThresholdsConfig;
use crate::sampler::ResourceSampler;

/// One CPU/memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    /// CPU usage percent.
    pub cpu_percent: f64,
    /// Memory usage percent.
    pub memory_percent: f64,
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
}

/// Which resource breached its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    /// CPU usage.
    Cpu,
    /// Memory usage.
    Memory,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("CPU"),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// A threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceAlert {
    /// Breached resource.
    pub kind: ResourceKind,
    /// Observed percent.
    pub value: f64,
    /// Configured threshold percent.
    pub threshold: f64,
}

impl ResourceAlert {
    /// Alert subject, e.g. `High CPU usage`.
    pub fn subject(&self) -> String {
        format!("High {} usage", self.kind)
    }

    /// Alert text, e.g. `High CPU usage detected: 91.25%`.
    pub fn message(&self) -> String {
        format!("High {} usage detected: {:.2}%", self.kind, self.value)
    }
}

/// Samples host resources through a [`ResourceSampler`].
#[derive(Clone)]
pub struct ResourceWatcher {
    sampler: Arc<dyn ResourceSampler>,
}

impl ResourceWatcher {
    /// Create a watcher over a sampler.
    pub fn new(sampler: Arc<dyn ResourceSampler>) -> Self {
        Self { sampler }
    }

    /// Take one sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the sampler fails.
    pub async fn sample(&self) -> anyhow::Result<ResourceSample> {
        let cpu_percent = self.sampler.cpu_percent().await?;
        let memory_percent = self.sampler.memory_percent().await?;
        Ok(ResourceSample {
            cpu_percent,
            memory_percent,
            sampled_at: Utc::now(),
        })
    }
}

/// Compare a sample against thresholds. CPU and memory are independent.
pub fn evaluate(sample: &ResourceSample, thresholds: &ThresholdsConfig) -> Vec<ResourceAlert> {
    let mut alerts = Vec::new();
    if sample.cpu_percent > thresholds.cpu_percent {
        alerts.push(ResourceAlert {
            kind: ResourceKind::Cpu,
            value: sample.cpu_percent,
            threshold: thresholds.cpu_percent,
        });
    }
    if sample.memory_percent > thresholds.memory_percent {
        alerts.push(ResourceAlert {
            kind: ResourceKind::Memory,
            value: sample.memory_percent,
            threshold: thresholds.memory_percent,
        });
    }
    alerts
}
