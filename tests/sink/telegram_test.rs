//! Telegram message formatting.

use vigil::monitor::report::{Report, Severity};
use vigil::sink::TelegramSink;

#[test]
fn message_has_bold_escaped_subject() {
    let report = Report::message("Network Error", Severity::Warning, "ECONNREFUSED <db>");
    let text = TelegramSink::format_message("[Vigil] Network Error & more", &report);

    assert!(text.starts_with("<b>[Vigil] Network Error &amp; more</b>\n\n"));
    assert!(text.contains("ECONNREFUSED &lt;db&gt;"));
    assert!(!text.contains("<db>"));
}

#[test]
fn long_reports_are_truncated() {
    let body = "x".repeat(10_000);
    let report = Report::message("Big", Severity::Info, &body);
    let text = TelegramSink::format_message("Big", &report);

    assert!(text.chars().count() < 4096);
    assert!(text.ends_with('\u{2026}'));
}

#[tokio::test]
async fn sink_without_recipients_is_a_no_op() {
    use vigil::sink::AlertSink;

    let sink = TelegramSink::new("123:fake-token", Vec::new());
    let report = Report::message("Monitor Started", Severity::Info, "hello");
    assert!(sink.send("Monitor Started", &report).await.is_ok());
    assert_eq!(sink.name(), "telegram");
}
