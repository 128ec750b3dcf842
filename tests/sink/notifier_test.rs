//! Tests for the enable gate, subject prefixing, and failure containment.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vigil::config::{AlertsConfig, WebhookAlertConfig};
use vigil::credentials::Credentials;
use vigil::monitor::report::{Report, Severity};
use vigil::sampler::ResourceSampler;
use vigil::sink::{AlertSink, Notifier, SinkError};

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, Report)>>,
}

impl RecordingSink {
    fn subjects(&self) -> Vec<String> {
        match self.sent.lock() {
            Ok(sent) => sent.iter().map(|(subject, _)| subject.clone()).collect(),
            Err(_) => panic!("recording sink lock poisoned"),
        }
    }

    fn reports(&self) -> Vec<Report> {
        match self.sent.lock() {
            Ok(sent) => sent.iter().map(|(_, report)| report.clone()).collect(),
            Err(_) => panic!("recording sink lock poisoned"),
        }
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, subject: &str, report: &Report) -> Result<(), SinkError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((subject.to_owned(), report.clone()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct FailingSink;

#[async_trait]
impl AlertSink for FailingSink {
    async fn send(&self, _subject: &str, _report: &Report) -> Result<(), SinkError> {
        Err(SinkError::Transport("connection refused".to_owned()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Remembers the last CPU reading and counts fresh measurements.
struct TickSampler {
    measurements: AtomicUsize,
}

#[async_trait]
impl ResourceSampler for TickSampler {
    async fn cpu_percent(&self) -> anyhow::Result<f64> {
        self.measurements.fetch_add(1, Ordering::SeqCst);
        Ok(3.0)
    }

    async fn memory_percent(&self) -> anyhow::Result<f64> {
        Ok(61.5)
    }

    async fn last_cpu_percent(&self) -> anyhow::Result<f64> {
        Ok(87.25)
    }
}

fn sample_report() -> Report {
    Report::message("Disk Space Alert", Severity::Warning, "Low disk space detected")
}

#[tokio::test]
async fn disabled_notifier_sends_nothing() {
    let sink = Arc::new(RecordingSink::default());
    let notifier = Notifier::new(false, "[Vigil]".to_owned(), vec![sink.clone()]);

    assert!(!notifier.is_enabled());
    assert!(!notifier.notify("Disk Space Alert", sample_report()).await);
    assert!(sink.subjects().is_empty());
}

#[tokio::test]
async fn notifier_without_sinks_is_disabled() {
    let notifier = Notifier::new(true, "[Vigil]".to_owned(), Vec::new());
    assert!(!notifier.is_enabled());
    assert!(!Notifier::disabled().is_enabled());
}

#[tokio::test]
async fn subject_is_prefixed_and_host_facts_attached() {
    let sink = Arc::new(RecordingSink::default());
    let notifier = Notifier::new(true, "[Vigil]".to_owned(), vec![sink.clone()]);

    assert!(notifier.notify("Disk Space Alert", sample_report()).await);
    assert_eq!(sink.subjects(), vec!["[Vigil] Disk Space Alert"]);

    let reports = sink.reports();
    let facts: Vec<&str> = reports[0].facts.iter().map(|(key, _)| key.as_str()).collect();
    assert!(facts.contains(&"Host"));
    assert!(facts.contains(&"Platform"));
    assert!(facts.contains(&"Uptime"));
}

#[tokio::test]
async fn footer_reuses_last_cpu_measurement() {
    let sink = Arc::new(RecordingSink::default());
    let sampler = Arc::new(TickSampler {
        measurements: AtomicUsize::new(0),
    });
    let notifier = Notifier::new(true, "[Vigil]".to_owned(), vec![sink.clone()])
        .with_sampler(sampler.clone());

    assert!(notifier.notify("High CPU usage", sample_report()).await);
    assert_eq!(sampler.measurements.load(Ordering::SeqCst), 0);

    let reports = sink.reports();
    let fact = |key: &str| {
        reports[0]
            .facts
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    };
    assert_eq!(fact("CPU Usage").as_deref(), Some("87.25%"));
    assert_eq!(fact("Memory Usage").as_deref(), Some("61.50%"));
}

#[tokio::test]
async fn empty_prefix_leaves_subject_unchanged() {
    let sink = Arc::new(RecordingSink::default());
    let notifier = Notifier::new(true, String::new(), vec![sink.clone()]);

    notifier.notify("Monitor Started", sample_report()).await;
    assert_eq!(sink.subjects(), vec!["Monitor Started"]);
}

#[tokio::test]
async fn failing_sink_does_not_block_others() {
    let sink = Arc::new(RecordingSink::default());
    let notifier = Notifier::new(
        true,
        "[Vigil]".to_owned(),
        vec![Arc::new(FailingSink), sink.clone()],
    );

    assert!(notifier.notify("Network Error", sample_report()).await);
    assert_eq!(sink.subjects().len(), 1);
}

#[tokio::test]
async fn all_sinks_failing_reports_undelivered() {
    let notifier = Notifier::new(true, "[Vigil]".to_owned(), vec![Arc::new(FailingSink)]);
    assert!(!notifier.notify("Network Error", sample_report()).await);
}

#[test]
fn from_config_disabled_has_no_sinks() {
    let notifier = Notifier::from_config(
        &AlertsConfig::default(),
        &Credentials::default(),
        reqwest::Client::new(),
    )
    .expect("disabled config should build");
    assert!(!notifier.is_enabled());
}

#[test]
fn from_config_enabled_without_remote_sink_falls_back_to_log() {
    let config = AlertsConfig {
        enabled: true,
        ..AlertsConfig::default()
    };
    let notifier = Notifier::from_config(&config, &Credentials::default(), reqwest::Client::new())
        .expect("log-only config should build");
    assert!(notifier.is_enabled());
}

#[test]
fn from_config_requires_webhook_token_when_named() {
    let config = AlertsConfig {
        enabled: true,
        webhook: Some(WebhookAlertConfig {
            url: "http://127.0.0.1:9/hook".to_owned(),
            token_env: Some("VIGIL_TEST_UNSET_WEBHOOK_TOKEN_71c2".to_owned()),
        }),
        ..AlertsConfig::default()
    };
    let result = Notifier::from_config(&config, &Credentials::default(), reqwest::Client::new());
    assert!(result.is_err());
}
