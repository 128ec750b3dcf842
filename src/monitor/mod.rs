//! Health-check and recovery core.
//!
//! A [`Monitor`] owns the target registry, the health store, and the
//! collaborators behind their traits. Each tick runs, strictly in order:
//! endpoint probes → recovery → confirmation re-probe → failure alert,
//! then the resource check, the log pass with maintenance, and finally the
//! daily status report when it is due.

pub mod classifier;
pub mod maintenance;
pub mod probe;
pub mod recovery;
pub mod report;
pub mod resources;
pub mod scheduler;
pub mod state;
pub mod target;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ThresholdsConfig, VigilConfig};
use crate::controller::ProcessController;
use crate::logsource::LogSource;
use crate::sampler::ResourceSampler;
use crate::sink::Notifier;

use self::classifier::{Category, CategoryHits, RemediationSettings, Remediator};
use self::probe::{ProbeResult, Prober};
use self::recovery::{RecoveryController, RecoveryOutcome, RecoveryPolicy};
use self::report::{Report, Severity};
use self::resources::{ResourceAlert, ResourceWatcher};
use self::scheduler::{DailyLatch, TickRunner};
use self::state::{HealthRecord, HealthStore};
use self::target::{Target, TargetRegistry};

/// Tunables for a [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Process whose log lines are classified.
    pub app_name: String,
    /// Tick interval; also sizes the report window.
    pub interval: Duration,
    /// CPU/memory thresholds.
    pub thresholds: ThresholdsConfig,
    /// Restart limits.
    pub recovery: RecoveryPolicy,
    /// Local `(hour, minute)` of the daily report.
    pub report_time: (u32, u32),
    /// Vigil's own log directory, pruned every tick.
    pub log_dir: Option<PathBuf>,
    /// Application log directory, purged on disk-space signatures.
    pub app_log_dir: Option<PathBuf>,
    /// Log retention window.
    pub retention_days: u64,
    /// URL used for the connectivity re-check.
    pub connectivity_url: String,
}

impl MonitorSettings {
    /// Derive settings from configuration.
    pub fn from_config(config: &VigilConfig, log_dir: Option<PathBuf>) -> Self {
        Self {
            app_name: config.app.name.clone(),
            interval: Duration::from_secs(config.checks.interval_secs),
            thresholds: config.thresholds,
            recovery: RecoveryPolicy::from(&config.recovery),
            report_time: config.report_time(),
            log_dir,
            app_log_dir: config.logs.source_dir.clone(),
            retention_days: config.logs.retention_days,
            connectivity_url: config.logs.connectivity_url.clone(),
        }
    }
}

/// Collaborators handed to [`Monitor::new`].
pub struct MonitorDeps {
    /// Monitored endpoints.
    pub registry: TargetRegistry,
    /// HTTP prober.
    pub prober: Prober,
    /// Restarts unhealthy targets.
    pub controller: Arc<dyn ProcessController>,
    /// CPU/memory readings.
    pub sampler: Arc<dyn ResourceSampler>,
    /// Application log lines, if configured.
    pub log_source: Option<Box<dyn LogSource>>,
    /// Alert delivery.
    pub notifier: Notifier,
    /// HTTP client for connectivity re-checks.
    pub client: reqwest::Client,
    /// Tunables.
    pub settings: MonitorSettings,
}

/// Results of the endpoint phase of one tick.
#[derive(Debug, Clone, Default)]
pub struct EndpointCycle {
    /// First-pass probe results for every target.
    pub results: Vec<ProbeResult>,
    /// Every restart attempt made this tick.
    pub recovery: Vec<RecoveryOutcome>,
    /// Confirmation re-probe of the targets that failed the first pass.
    pub confirmed: Vec<ProbeResult>,
    /// Whether a failure alert was delivered.
    pub alerted: bool,
}

impl EndpointCycle {
    /// Targets still unhealthy after recovery.
    pub fn still_unhealthy(&self) -> Vec<&ProbeResult> {
        self.confirmed.iter().filter(|r| !r.healthy).collect()
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// Endpoint phase.
    pub endpoints: EndpointCycle,
    /// Resource alerts raised.
    pub resource_alerts: Vec<ResourceAlert>,
    /// Log signatures handled.
    pub log_hits: BTreeMap<Category, CategoryHits>,
    /// Whether the daily report was sent.
    pub report_sent: bool,
}

/// The health-check and recovery scheduler core.
pub struct Monitor {
    registry: TargetRegistry,
    prober: Prober,
    recovery: RecoveryController,
    resources: ResourceWatcher,
    remediator: Remediator,
    log_source: Option<Mutex<Box<dyn LogSource>>>,
    notifier: Notifier,
    store: Mutex<HealthStore>,
    settings: MonitorSettings,
    report_latch: DailyLatch,
}

impl Monitor {
    /// Assemble a monitor from its collaborators.
    pub fn new(deps: MonitorDeps) -> Self {
        let MonitorDeps {
            registry,
            prober,
            controller,
            sampler,
            log_source,
            notifier,
            client,
            settings,
        } = deps;

        let purge_dirs = settings
            .app_log_dir
            .iter()
            .chain(settings.log_dir.iter())
            .cloned()
            .collect();
        let remediator = Remediator::new(
            RemediationSettings {
                app_name: settings.app_name.clone(),
                connectivity_url: settings.connectivity_url.clone(),
                purge_dirs,
                retention_days: settings.retention_days,
            },
            notifier.clone(),
            Arc::clone(&controller),
            client,
        );

        Self {
            store: Mutex::new(HealthStore::new(registry.names())),
            recovery: RecoveryController::new(controller, settings.recovery),
            resources: ResourceWatcher::new(sampler),
            remediator,
            log_source: log_source.map(Mutex::new),
            registry,
            prober,
            notifier,
            settings,
            report_latch: DailyLatch::new(),
        }
    }

    /// The monitored targets.
    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Point-in-time copy of every target's health record.
    pub async fn snapshot(&self) -> Vec<(String, HealthRecord)> {
        self.store.lock().await.snapshot()
    }

    /// Run one full tick with the current local time.
    ///
    /// # Errors
    ///
    /// Never fails in practice; steady-state errors are logged where they
    /// occur. The signature leaves room for the scheduler's error path.
    pub async fn tick(&self) -> anyhow::Result<TickSummary> {
        self.tick_at(&Local::now()).await
    }

    /// Run one full tick as if the wall clock read `now`.
    ///
    /// # Errors
    ///
    /// See [`Monitor::tick`].
    pub async fn tick_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> anyhow::Result<TickSummary> {
        let mut store = self.store.lock().await;

        let endpoints = self.check_endpoints(&mut store).await;
        let resource_alerts = self.check_resources().await;
        let log_hits = self.check_logs().await;
        self.run_maintenance();

        let report_sent = if scheduler::is_report_time(
            now,
            self.settings.report_time,
            self.settings.interval,
        ) && self.report_latch.try_fire(now.date_naive())
        {
            self.send_status_report(&store).await
        } else {
            false
        };

        debug!(
            probed = endpoints.results.len(),
            unhealthy = endpoints.still_unhealthy().len(),
            "tick complete"
        );

        Ok(TickSummary {
            endpoints,
            resource_alerts,
            log_hits,
            report_sent,
        })
    }

    /// Probe every target and record the results, without recovery or alerts.
    pub async fn probe_all(&self) -> Vec<ProbeResult> {
        let mut store = self.store.lock().await;
        let results = self
            .prober
            .check_all(self.registry.targets(), &store)
            .await;
        store.update(&results);
        results
    }

    /// Probe, recover failures, re-probe once, and alert on what is still down.
    pub async fn check_endpoints(&self, store: &mut HealthStore) -> EndpointCycle {
        let results = self.prober.check_all(self.registry.targets(), store).await;
        store.update(&results);

        let failed: Vec<ProbeResult> = results.iter().filter(|r| !r.healthy).cloned().collect();
        if failed.is_empty() {
            return EndpointCycle {
                results,
                ..EndpointCycle::default()
            };
        }

        info!(count = failed.len(), "unhealthy endpoints, attempting recovery");
        let recovery = self.recovery.recover(&failed).await;

        let retry: Vec<&Target> = failed
            .iter()
            .filter_map(|r| self.registry.get(&r.target))
            .collect();
        let confirmed = self.prober.check_all(retry, store).await;
        store.update(&confirmed);

        let mut alerted = false;
        if self.notifier.is_enabled() {
            if let Some(report) = report::failure_report(&confirmed, &recovery) {
                alerted = self.notifier.notify("Endpoint Health Alert", report).await;
            }
        }

        EndpointCycle {
            results,
            recovery,
            confirmed,
            alerted,
        }
    }

    /// Sample resources and alert on each breached threshold.
    pub async fn check_resources(&self) -> Vec<ResourceAlert> {
        let sample = match self.resources.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "resource sampling failed");
                return Vec::new();
            }
        };

        let alerts = resources::evaluate(&sample, &self.settings.thresholds);
        for alert in &alerts {
            warn!(
                resource = %alert.kind,
                value = alert.value,
                threshold = alert.threshold,
                "{}",
                alert.message()
            );
            let subject = alert.subject();
            self.notifier
                .notify(
                    &subject,
                    Report::message(&subject, Severity::Warning, &alert.message()),
                )
                .await;
        }
        alerts
    }

    /// Drain new application log lines and remediate known signatures.
    pub async fn check_logs(&self) -> BTreeMap<Category, CategoryHits> {
        let Some(source) = &self.log_source else {
            return BTreeMap::new();
        };
        let lines = match source.lock().await.poll().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "failed to read application logs");
                return BTreeMap::new();
            }
        };
        if lines.is_empty() {
            return BTreeMap::new();
        }
        self.remediator.process(&lines).await
    }

    /// Remove Vigil's own expired log files.
    pub fn run_maintenance(&self) {
        let Some(dir) = &self.settings.log_dir else {
            return;
        };
        if let Err(e) = maintenance::prune_logs(dir, self.settings.retention_days) {
            warn!(error = %e, "log cleanup failed");
        }
    }

    /// Build and send the status report. Skipped entirely when alerts are off.
    pub async fn send_status_report(&self, store: &HealthStore) -> bool {
        if !self.notifier.is_enabled() {
            debug!("alerts disabled, skipping daily status report");
            return false;
        }
        let report = report::status_report(&store.snapshot());
        self.notifier.notify("Daily Status Report", report).await
    }

    /// Build and send the status report from the current store.
    pub async fn send_current_report(&self) -> bool {
        let store = self.store.lock().await;
        self.send_status_report(&store).await
    }

    /// Announce startup.
    pub async fn announce_start(&self) {
        self.notifier
            .notify(
                "Monitor Started",
                Report::message(
                    "Monitor Started",
                    Severity::Info,
                    "Application monitoring has been initiated successfully.",
                ),
            )
            .await;
    }
}

#[async_trait]
impl TickRunner for Monitor {
    async fn run_tick(&self) -> anyhow::Result<()> {
        self.tick().await.map(|_| ())
    }
}
