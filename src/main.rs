//! Vigil CLI entry point.
//!
//! Provides `start`, `check`, and `report` subcommands for running the
//! monitoring daemon, performing a single probe pass, or sending the status
//! report on demand.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use vigil::config::{load_config, vigil_paths, VigilConfig, VigilPaths};
use vigil::controller;
use vigil::credentials::{load_optional_credentials, Credentials};
use vigil::logsource::{FileLogSource, LogSource};
use vigil::monitor::probe::Prober;
use vigil::monitor::scheduler::run_scheduler;
use vigil::monitor::target::TargetRegistry;
use vigil::monitor::{Monitor, MonitorDeps, MonitorSettings};
use vigil::sampler::{ResourceSampler, SysinfoSampler};
use vigil::sink::Notifier;

/// Vigil: endpoint health checks, automatic recovery, and alerting.
#[derive(Parser)]
#[command(name = "vigil", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the monitoring daemon.
    Start {
        /// Config file (default: ~/.vigil/vigil.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Probe every target once, print the results, and exit.
    Check {
        /// Config file (default: ~/.vigil/vigil.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Probe once and send the status report immediately.
    Report {
        /// Config file (default: ~/.vigil/vigil.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start { config } => handle_start(config).await,
        Command::Check { config } => handle_check(config).await,
        Command::Report { config } => handle_report(config).await,
    }
}

/// Run the monitoring daemon until Ctrl-C.
async fn handle_start(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let paths = vigil_paths()?;
    let config_path = config_path.unwrap_or_else(|| paths.config_toml.clone());

    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let logs_dir = config
        .app
        .log_dir
        .clone()
        .unwrap_or_else(|| paths.logs_dir.clone());
    let _logging_guard = vigil::logging::init_production(&logs_dir)?;

    let monitor = Arc::new(build_monitor(&config, &paths, &config_path, Some(logs_dir))?);

    info!(
        config = %config_path.display(),
        targets = monitor.registry().len(),
        interval_secs = config.checks.interval_secs,
        "vigil monitor started"
    );
    monitor.announce_start().await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(
        Arc::clone(&monitor),
        Duration::from_secs(config.checks.interval_secs),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("received shutdown signal, initiating graceful shutdown");
    let _ = shutdown_tx.send(true);

    match scheduler.await {
        Ok(stats) => info!(
            ticks = stats.started,
            skipped = stats.skipped,
            failed = stats.failed,
            "vigil stopped"
        ),
        Err(e) => warn!(error = %e, "scheduler task ended abnormally"),
    }
    Ok(())
}

/// Run a single probe pass and log each target's record.
async fn handle_check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    vigil::logging::init_cli();

    let paths = vigil_paths()?;
    let config_path = config_path.unwrap_or_else(|| paths.config_toml.clone());
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let registry = TargetRegistry::from_configs(&config.targets).context("invalid targets")?;
    let monitor = Monitor::new(MonitorDeps {
        registry,
        prober: Prober::new()?,
        controller: Arc::from(controller::from_config(&config.recovery)),
        sampler: Arc::new(SysinfoSampler::new()),
        log_source: None,
        notifier: Notifier::disabled(),
        client: reqwest::Client::new(),
        settings: MonitorSettings::from_config(&config, None),
    });

    let results = monitor.probe_all().await;
    let unhealthy = results.iter().filter(|r| !r.healthy).count();
    for (name, record) in monitor.snapshot().await {
        let json =
            serde_json::to_string_pretty(&record).context("failed to serialize health record")?;
        info!(target = %name, record = %json, "current health");
    }

    if unhealthy == 0 {
        info!(targets = results.len(), "all endpoints healthy");
    } else {
        for result in results.iter().filter(|r| !r.healthy) {
            warn!(
                target = %result.target,
                url = %result.url,
                error = result.error.as_deref().unwrap_or("unknown"),
                "endpoint unhealthy"
            );
        }
    }
    Ok(())
}

/// Probe once and send the status report.
async fn handle_report(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    vigil::logging::init_cli();

    let paths = vigil_paths()?;
    let config_path = config_path.unwrap_or_else(|| paths.config_toml.clone());
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let monitor = build_monitor(&config, &paths, &config_path, None)?;
    monitor.probe_all().await;

    if monitor.send_current_report().await {
        info!("status report sent");
    } else {
        warn!("status report was not delivered (alerts disabled or every sink failed)");
    }
    Ok(())
}

/// Wire a [`Monitor`] from configuration and secrets.
fn build_monitor(
    config: &VigilConfig,
    paths: &VigilPaths,
    config_path: &Path,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<Monitor> {
    let env_file = config_path
        .parent()
        .map(|dir| dir.join(".env"))
        .unwrap_or_else(|| paths.env_file.clone());
    let credentials: Credentials = load_optional_credentials(&env_file)
        .with_context(|| format!("failed to load {}", env_file.display()))?;

    let registry = TargetRegistry::from_configs(&config.targets).context("invalid targets")?;
    if registry.is_empty() {
        warn!("no targets configured, only resources and logs will be watched");
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")?;

    let sampler: Arc<dyn ResourceSampler> = Arc::new(SysinfoSampler::new());
    let notifier = Notifier::from_config(&config.alerts, &credentials, client.clone())
        .context("failed to configure alert sinks")?
        .with_sampler(Arc::clone(&sampler));

    let log_source = config.logs.source_dir.clone().map(|dir| {
        info!(dir = %dir.display(), "tailing application logs");
        Box::new(FileLogSource::new(dir)) as Box<dyn LogSource>
    });

    Ok(Monitor::new(MonitorDeps {
        registry,
        prober: Prober::with_client(client.clone()),
        controller: Arc::from(controller::from_config(&config.recovery)),
        sampler,
        log_source,
        notifier,
        client,
        settings: MonitorSettings::from_config(config, log_dir),
    }))
}
