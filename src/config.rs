//! Configuration loading for the Vigil monitor.
//!
//! Loads `vigil.toml` with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal config file (just `[[targets]]`) is valid.
//! Secrets are never stored here; sections reference environment variable
//! names that are resolved against [`crate::credentials::Credentials`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Top-level Vigil configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VigilConfig {
    /// The monitored application.
    #[serde(default)]
    pub app: AppConfig,

    /// Periodic check timing.
    #[serde(default)]
    pub checks: ChecksConfig,

    /// Resource usage thresholds.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Restart and retry behavior.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Application log inspection and retention.
    #[serde(default)]
    pub logs: LogsConfig,

    /// Alert sink settings.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Monitored HTTP endpoints, in registration order.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// The application whose logs are inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Process name; only log lines from this origin are classified.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Directory for Vigil's own logs. Defaults to `~/.vigil/logs`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_dir: None,
        }
    }
}

/// Timing for the scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecksConfig {
    /// Seconds between ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Local time of day for the daily status report (HH:MM).
    #[serde(default = "default_report_time")]
    pub report_time: String,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            report_time: default_report_time(),
        }
    }
}

/// CPU and memory alert thresholds, in percent.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ThresholdsConfig {
    /// CPU usage above which a CPU alert fires.
    #[serde(default = "default_percent_threshold")]
    pub cpu_percent: f64,

    /// Memory usage above which a memory alert fires.
    #[serde(default = "default_percent_threshold")]
    pub memory_percent: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            cpu_percent: default_percent_threshold(),
            memory_percent: default_percent_threshold(),
        }
    }
}

/// Which process controller restarts unhealthy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    /// Run `restart_command` with `{name}` substituted.
    Command,
    /// `systemctl --user restart <name>.service`.
    Systemd,
}

/// Restart and retry behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    /// Maximum restart attempts per unhealthy target per tick.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    /// Maximum number of targets being restarted at the same time.
    #[serde(default = "default_max_concurrent_restarts")]
    pub max_concurrent_restarts: usize,

    /// Upper bound for a single restart call.
    #[serde(default = "default_restart_timeout_secs")]
    pub restart_timeout_secs: u64,

    /// Pause between failed attempts for the same target.
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Process controller implementation.
    #[serde(default = "default_controller")]
    pub controller: ControllerKind,

    /// Restart command template for [`ControllerKind::Command`].
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,

    /// Optional heap dump command template, run on memory-leak signatures.
    #[serde(default)]
    pub heap_dump_command: Option<Vec<String>>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: default_retry_ceiling(),
            max_concurrent_restarts: default_max_concurrent_restarts(),
            restart_timeout_secs: default_restart_timeout_secs(),
            retry_delay_ms: 0,
            controller: default_controller(),
            restart_command: default_restart_command(),
            heap_dump_command: None,
        }
    }
}

/// Log inspection and retention.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
    /// Directory of application log files to tail. Disabled when unset.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Log files older than this many days are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// URL fetched to confirm outbound connectivity after network errors.
    #[serde(default = "default_connectivity_url")]
    pub connectivity_url: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            retention_days: default_retention_days(),
            connectivity_url: default_connectivity_url(),
        }
    }
}

/// Alert sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Master switch. When false nothing is sent and reports are not built.
    #[serde(default)]
    pub enabled: bool,

    /// Prefix prepended to every subject.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Telegram delivery.
    #[serde(default)]
    pub telegram: Option<TelegramAlertConfig>,

    /// Generic JSON webhook delivery.
    #[serde(default)]
    pub webhook: Option<WebhookAlertConfig>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subject_prefix: default_subject_prefix(),
            telegram: None,
            webhook: None,
        }
    }
}

/// Telegram alert targets.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramAlertConfig {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Chat IDs that receive alerts.
    #[serde(default)]
    pub notify_users: Vec<i64>,
}

/// Webhook alert target.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookAlertConfig {
    /// Endpoint receiving a JSON POST per alert.
    pub url: String,

    /// Environment variable name holding an optional bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

/// One monitored endpoint as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Unique name; also the process name passed to the controller.
    pub name: String,

    /// Health endpoint URL.
    pub url: String,

    /// HTTP method.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Status code that counts as healthy.
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
}

/// Resolved filesystem paths for Vigil's own state.
#[derive(Debug, Clone)]
pub struct VigilPaths {
    /// Root directory (`~/.vigil/`).
    pub root: PathBuf,

    /// Default config file location.
    pub config_toml: PathBuf,

    /// Secrets file location.
    pub env_file: PathBuf,

    /// Default directory for Vigil's own log files.
    pub logs_dir: PathBuf,
}

impl VigilConfig {
    /// Validate that configuration values are within sane bounds.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.app.name.trim().is_empty(), "app.name must not be empty");
        anyhow::ensure!(self.checks.interval_secs >= 5, "checks.interval_secs must be >= 5");
        anyhow::ensure!(
            parse_hh_mm(&self.checks.report_time).is_some(),
            "checks.report_time must be HH:MM format (00:00 - 23:59)"
        );
        anyhow::ensure!(
            self.thresholds.cpu_percent > 0.0 && self.thresholds.cpu_percent <= 100.0,
            "thresholds.cpu_percent must be in (0, 100]"
        );
        anyhow::ensure!(
            self.thresholds.memory_percent > 0.0 && self.thresholds.memory_percent <= 100.0,
            "thresholds.memory_percent must be in (0, 100]"
        );
        anyhow::ensure!(
            (1..=10).contains(&self.recovery.retry_ceiling),
            "recovery.retry_ceiling must be in [1, 10]"
        );
        anyhow::ensure!(
            self.recovery.max_concurrent_restarts >= 1,
            "recovery.max_concurrent_restarts must be >= 1"
        );
        anyhow::ensure!(
            self.recovery.restart_timeout_secs >= 1,
            "recovery.restart_timeout_secs must be >= 1"
        );
        if self.recovery.controller == ControllerKind::Command {
            anyhow::ensure!(
                !self.recovery.restart_command.is_empty(),
                "recovery.restart_command must not be empty"
            );
        }
        anyhow::ensure!(self.logs.retention_days >= 1, "logs.retention_days must be >= 1");
        anyhow::ensure!(
            self.logs.connectivity_url.starts_with("http://")
                || self.logs.connectivity_url.starts_with("https://"),
            "logs.connectivity_url must be an http(s) URL"
        );
        Ok(())
    }

    /// Parsed daily report time as `(hour, minute)`.
    pub fn report_time(&self) -> (u32, u32) {
        parse_hh_mm(&self.checks.report_time).unwrap_or((0, 0))
    }
}

/// Parse an `HH:MM` string into `(hour, minute)`.
pub fn parse_hh_mm(value: &str) -> Option<(u32, u32)> {
    let (h, m) = value.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
///
/// Returns an error if the text is not valid TOML or fails validation.
pub fn parse_config(contents: &str) -> anyhow::Result<VigilConfig> {
    let config: VigilConfig = toml::from_str(contents).context("failed to parse vigil config")?;
    config.validate()?;
    Ok(config)
}

/// Load Vigil configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<VigilConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read vigil config at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid vigil config at {}", path.display()))
}

/// Resolve Vigil's filesystem paths under `~/.vigil/`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn vigil_paths() -> anyhow::Result<VigilPaths> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    let root = home.home_dir().join(".vigil");
    Ok(VigilPaths {
        config_toml: root.join("vigil.toml"),
        env_file: root.join(".env"),
        logs_dir: root.join("logs"),
        root,
    })
}

// Default value functions for serde.

fn default_app_name() -> String {
    "nodeapp".to_owned()
}

fn default_interval_secs() -> u64 {
    30
}

fn default_report_time() -> String {
    "00:00".to_owned()
}

fn default_percent_threshold() -> f64 {
    80.0
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_max_concurrent_restarts() -> usize {
    2
}

fn default_restart_timeout_secs() -> u64 {
    30
}

fn default_controller() -> ControllerKind {
    ControllerKind::Command
}

fn default_restart_command() -> Vec<String> {
    vec!["pm2".to_owned(), "restart".to_owned(), "{name}".to_owned()]
}

fn default_retention_days() -> u64 {
    7
}

fn default_connectivity_url() -> String {
    "https://api.github.com".to_owned()
}

fn default_subject_prefix() -> String {
    "[Vigil]".to_owned()
}

fn default_bot_token_env() -> String {
    "VIGIL_TELEGRAM_TOKEN".to_owned()
}

fn default_method() -> String {
    "GET".to_owned()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_expected_status() -> u16 {
    200
}
