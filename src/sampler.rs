//! Host resource sampling.
//!
//! [`ResourceSampler`] is the seam the resource watcher consumes;
//! [`SysinfoSampler`] is the production implementation backed by `sysinfo`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use sysinfo::System;

/// Source of CPU and memory usage percentages.
#[async_trait]
pub trait ResourceSampler: Send + Sync {
    /// Global CPU usage, 0-100.
    async fn cpu_percent(&self) -> anyhow::Result<f64>;

    /// Used memory as a share of total, 0-100.
    async fn memory_percent(&self) -> anyhow::Result<f64>;

    /// CPU usage from the most recent [`cpu_percent`](Self::cpu_percent)
    /// measurement, without starting a new one.
    async fn last_cpu_percent(&self) -> anyhow::Result<f64> {
        self.cpu_percent().await
    }
}

/// `sysinfo`-backed sampler. CPU usage is measured between consecutive calls.
#[derive(Clone)]
pub struct SysinfoSampler {
    system: Arc<Mutex<System>>,
}

impl SysinfoSampler {
    /// Create a sampler and take the CPU baseline.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }

    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> anyhow::Result<T> {
        let mut guard = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("system sampler lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceSampler for SysinfoSampler {
    async fn cpu_percent(&self) -> anyhow::Result<f64> {
        self.with_system(|system| {
            system.refresh_cpu_usage();
            f64::from(system.global_cpu_usage())
        })
    }

    async fn memory_percent(&self) -> anyhow::Result<f64> {
        self.with_system(|system| {
            system.refresh_memory();
            used_share(system.total_memory(), system.available_memory())
        })
    }

    // A refresh here would measure over the few milliseconds since the
    // tick's own sample and reset the baseline for the next one.
    async fn last_cpu_percent(&self) -> anyhow::Result<f64> {
        self.with_system(|system| f64::from(system.global_cpu_usage()))
    }
}

/// Percentage of `total` not covered by `available`.
#[allow(clippy::cast_precision_loss)]
pub fn used_share(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    (used as f64 / total as f64) * 100.0
}

/// Static host facts shown at the bottom of every alert.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    /// Hostname.
    pub host: String,
    /// OS name and version.
    pub platform: String,
    /// Seconds since boot.
    pub uptime_secs: u64,
}

impl HostInfo {
    /// Read host facts from the OS.
    pub fn current() -> Self {
        let platform = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{name} {version}"),
            (Some(name), None) => name,
            _ => std::env::consts::OS.to_owned(),
        };
        Self {
            host: System::host_name().unwrap_or_else(|| "unknown".to_owned()),
            platform,
            uptime_secs: System::uptime(),
        }
    }
}
