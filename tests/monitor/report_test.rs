//! Tests for tables, escaping, and recovery notes in `src/monitor/report.rs`.

use chrono::Utc;

use vigil::monitor::probe::ProbeResult;
use vigil::monitor::recovery::RecoveryOutcome;
use vigil::monitor::report::{
    failure_report, format_uptime, html_escape, status_report, Report, Severity,
};
use vigil::monitor::state::HealthRecord;

fn record(healthy: bool, response_time_ms: Option<u64>, failures: u32) -> HealthRecord {
    HealthRecord {
        healthy,
        last_checked: Utc::now(),
        response_time_ms,
        consecutive_failures: failures,
    }
}

fn failed(target: &str, error: &str) -> ProbeResult {
    ProbeResult {
        target: target.to_owned(),
        url: format!("http://localhost/{target}"),
        healthy: false,
        response_time_ms: None,
        error: Some(error.to_owned()),
        failure_count: 2,
        checked_at: Utc::now(),
    }
}

#[test]
fn status_report_lists_every_target_in_order() {
    let snapshot = vec![
        ("api".to_owned(), record(true, Some(42), 0)),
        ("auth".to_owned(), record(false, None, 3)),
    ];
    let report = status_report(&snapshot);

    assert_eq!(report.title, "Endpoint Status Report");
    assert_eq!(report.severity, Severity::Warning);
    assert_eq!(
        report.columns,
        vec!["Endpoint", "Status", "Response Time", "Failure Count", "Last Checked"]
    );
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0][..4], ["api", "Healthy", "42 ms", "0"]);
    assert_eq!(report.rows[1][..4], ["auth", "Unhealthy", "N/A", "3"]);
}

#[test]
fn all_healthy_status_report_is_info() {
    let snapshot = vec![("api".to_owned(), record(true, Some(1), 0))];
    assert_eq!(status_report(&snapshot).severity, Severity::Info);
}

#[test]
fn empty_status_report_explains_itself() {
    let report = status_report(&[]);
    assert!(report.rows.is_empty());
    assert!(report.intro.is_some());
}

#[test]
fn failure_report_is_none_when_all_healthy() {
    let mut ok = failed("api", "");
    ok.healthy = true;
    ok.error = None;
    ok.failure_count = 0;
    assert!(failure_report(&[ok], &[]).is_none());
}

#[test]
fn failure_report_includes_recovery_notes() {
    let results = vec![
        failed("api", "unexpected status 500 (expected 200)"),
        failed("auth", "request timed out after 5000ms"),
    ];
    let outcomes = vec![
        RecoveryOutcome {
            target: "api".to_owned(),
            attempt: 1,
            success: true,
            error: None,
        },
        RecoveryOutcome {
            target: "auth".to_owned(),
            attempt: 1,
            success: false,
            error: Some("pm2 exited".to_owned()),
        },
        RecoveryOutcome {
            target: "auth".to_owned(),
            attempt: 2,
            success: false,
            error: Some("pm2 exited again".to_owned()),
        },
    ];

    let report = failure_report(&results, &outcomes).expect("report for failures");
    assert_eq!(report.title, "Unhealthy Endpoints Detected");
    assert_eq!(report.severity, Severity::Critical);
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[1][2], "request timed out after 5000ms");
    assert_eq!(
        report.notes,
        vec![
            "api: restarted on attempt 1 but still unhealthy".to_owned(),
            "auth: restart failed after 2 attempt(s): pm2 exited again".to_owned(),
        ]
    );
}

#[test]
fn html_rendering_escapes_dynamic_text() {
    let report = failure_report(&[failed("<script>", "bad \"quote\" & <tag>")], &[])
        .expect("report for failures");
    let html = report.to_html();

    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(html.contains("bad &quot;quote&quot; &amp; &lt;tag&gt;"));
}

#[test]
fn facts_render_as_system_information() {
    let mut report = Report::message("Monitor Started", Severity::Info, "hello");
    report.facts = vec![("Host".to_owned(), "box-1".to_owned())];

    assert!(report.to_html().contains("<h4>System Information:</h4><ul><li>Host: box-1</li></ul>"));
    assert!(report.to_text().ends_with("System Information:\n- Host: box-1"));
}

#[test]
fn text_rendering_pairs_columns_with_cells() {
    let snapshot = vec![("api".to_owned(), record(true, Some(7), 0))];
    let text = status_report(&snapshot).to_text();
    assert!(text.starts_with("Endpoint Status Report"));
    assert!(text.contains("- Endpoint: api | Status: Healthy | Response Time: 7 ms"));
}

#[test]
fn with_note_appends() {
    let report = Report::message("Network Error", Severity::Warning, "x")
        .with_note("first".to_owned())
        .with_note("second".to_owned());
    assert_eq!(report.notes, vec!["first", "second"]);
}

#[test]
fn format_uptime_values() {
    assert_eq!(format_uptime(59), "0m");
    assert_eq!(format_uptime(3_660), "1h 1m");
    assert_eq!(format_uptime(3 * 86_400 + 14 * 3_600), "3d 14h");
}

#[test]
fn html_escape_handles_all_specials() {
    assert_eq!(html_escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
}
