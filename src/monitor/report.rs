//! Report and alert formatting.
//!
//! A [`Report`] is structured content (title, table, notes, host facts)
//! handed to alert sinks, which pick the rendering they need: HTML for
//! webhooks and mail-style consumers, plain text for chat.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::probe::ProbeResult;
use super::recovery::RecoveryOutcome;
use super::state::HealthRecord;

/// How urgent a report is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine status.
    Info,
    /// Needs attention.
    Warning,
    /// Service is down or at risk.
    Critical,
}

/// Structured alert body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Heading shown above the content.
    pub title: String,
    /// Urgency.
    pub severity: Severity,
    /// Optional lead paragraph.
    pub intro: Option<String>,
    /// Table header.
    pub columns: Vec<String>,
    /// Table rows; each has `columns.len()` cells.
    pub rows: Vec<Vec<String>>,
    /// Free-form lines below the table.
    pub notes: Vec<String>,
    /// Host facts, appended by the notifier.
    pub facts: Vec<(String, String)>,
}

impl Report {
    /// A report with only a title and a lead paragraph.
    pub fn message(title: &str, severity: Severity, text: &str) -> Self {
        Self {
            title: title.to_owned(),
            severity,
            intro: Some(text.to_owned()),
            columns: Vec::new(),
            rows: Vec::new(),
            notes: Vec::new(),
            facts: Vec::new(),
        }
    }

    /// Append a note line.
    #[must_use]
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    /// Render as an HTML fragment. All dynamic text is escaped.
    pub fn to_html(&self) -> String {
        let color = match self.severity {
            Severity::Info => "#2196f3",
            Severity::Warning => "#f57c00",
            Severity::Critical => "#d32f2f",
        };
        let mut html = String::new();
        let _ = write!(
            html,
            "<h3 style=\"color: {color};\">{}</h3>",
            html_escape(&self.title)
        );
        if let Some(intro) = &self.intro {
            let _ = write!(html, "<p>{}</p>", html_escape(intro));
        }
        if !self.columns.is_empty() {
            html.push_str("<table style=\"width: 100%; border-collapse: collapse;\"><thead><tr>");
            for column in &self.columns {
                let _ = write!(
                    html,
                    "<th style=\"padding: 8px; border: 1px solid #ddd;\">{}</th>",
                    html_escape(column)
                );
            }
            html.push_str("</tr></thead><tbody>");
            for row in &self.rows {
                html.push_str("<tr>");
                for cell in row {
                    let _ = write!(
                        html,
                        "<td style=\"padding: 8px; border: 1px solid #ddd;\">{}</td>",
                        html_escape(cell)
                    );
                }
                html.push_str("</tr>");
            }
            html.push_str("</tbody></table>");
        }
        for note in &self.notes {
            let _ = write!(html, "<p>{}</p>", html_escape(note));
        }
        if !self.facts.is_empty() {
            html.push_str("<h4>System Information:</h4><ul>");
            for (key, value) in &self.facts {
                let _ = write!(
                    html,
                    "<li>{}: {}</li>",
                    html_escape(key),
                    html_escape(value)
                );
            }
            html.push_str("</ul>");
        }
        html
    }

    /// Render as plain text.
    pub fn to_text(&self) -> String {
        let mut text = self.title.clone();
        if let Some(intro) = &self.intro {
            let _ = write!(text, "\n\n{intro}");
        }
        if !self.columns.is_empty() {
            text.push('\n');
            for row in &self.rows {
                let line = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| format!("{column}: {cell}"))
                    .collect::<Vec<_>>()
                    .join(" | ");
                let _ = write!(text, "\n- {line}");
            }
        }
        for note in &self.notes {
            let _ = write!(text, "\n\n{note}");
        }
        if !self.facts.is_empty() {
            text.push_str("\n\nSystem Information:");
            for (key, value) in &self.facts {
                let _ = write!(text, "\n- {key}: {value}");
            }
        }
        text
    }
}

/// Daily status table built from a health snapshot.
pub fn status_report(snapshot: &[(String, HealthRecord)]) -> Report {
    let rows = snapshot
        .iter()
        .map(|(name, record)| {
            vec![
                name.clone(),
                if record.healthy { "Healthy" } else { "Unhealthy" }.to_owned(),
                record
                    .response_time_ms
                    .map_or_else(|| "N/A".to_owned(), |ms| format!("{ms} ms")),
                record.consecutive_failures.to_string(),
                format_timestamp(&record.last_checked),
            ]
        })
        .collect();

    let severity = if snapshot.iter().all(|(_, record)| record.healthy) {
        Severity::Info
    } else {
        Severity::Warning
    };

    Report {
        title: "Endpoint Status Report".to_owned(),
        severity,
        intro: snapshot
            .is_empty()
            .then(|| "No endpoints have been checked yet.".to_owned()),
        columns: columns(&[
            "Endpoint",
            "Status",
            "Response Time",
            "Failure Count",
            "Last Checked",
        ]),
        rows,
        notes: Vec::new(),
        facts: Vec::new(),
    }
}

/// Alert for targets still unhealthy after recovery.
///
/// Returns `None` when every result is healthy. Recovery outcomes for the
/// listed targets are summarised as notes.
pub fn failure_report(results: &[ProbeResult], outcomes: &[RecoveryOutcome]) -> Option<Report> {
    let failed: Vec<&ProbeResult> = results.iter().filter(|r| !r.healthy).collect();
    if failed.is_empty() {
        return None;
    }

    let rows = failed
        .iter()
        .map(|result| {
            vec![
                result.target.clone(),
                result.url.clone(),
                result.error.clone().unwrap_or_else(|| "unknown".to_owned()),
                result.failure_count.to_string(),
                format_timestamp(&result.checked_at),
            ]
        })
        .collect();

    let notes = failed
        .iter()
        .filter_map(|result| recovery_note(&result.target, outcomes))
        .collect();

    Some(Report {
        title: "Unhealthy Endpoints Detected".to_owned(),
        severity: Severity::Critical,
        intro: None,
        columns: columns(&["Endpoint", "URL", "Error", "Failure Count", "Last Checked"]),
        rows,
        notes,
        facts: Vec::new(),
    })
}

fn recovery_note(target: &str, outcomes: &[RecoveryOutcome]) -> Option<String> {
    let attempts: Vec<&RecoveryOutcome> = outcomes.iter().filter(|o| o.target == target).collect();
    let last = attempts.last()?;
    if last.success {
        Some(format!(
            "{target}: restarted on attempt {} but still unhealthy",
            last.attempt
        ))
    } else {
        Some(format!(
            "{target}: restart failed after {} attempt(s): {}",
            attempts.len(),
            last.error.as_deref().unwrap_or("unknown error")
        ))
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Format uptime seconds into a human-readable string (e.g. "3d 14h").
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Escape HTML special characters.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
