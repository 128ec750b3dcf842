//! Log-only alert sink.

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{AlertSink, SinkError};
use crate::monitor::report::{Report, Severity};

/// Writes alerts to the tracing log at a level matching their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, subject: &str, report: &Report) -> Result<(), SinkError> {
        let body = report.to_text();
        match report.severity {
            Severity::Info => info!(subject = %subject, body = %body, "alert"),
            Severity::Warning => warn!(subject = %subject, body = %body, "alert"),
            Severity::Critical => error!(subject = %subject, body = %body, "alert"),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
