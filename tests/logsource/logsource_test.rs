//! Tests for log tailing and origin tagging.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use vigil::logsource::{origin_from_path, ChannelLogSource, FileLogSource, LogLine, LogSource};

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log file");
    file.write_all(text.as_bytes()).expect("append log line");
}

#[test]
fn origin_strips_pm2_suffixes() {
    assert_eq!(origin_from_path(Path::new("/logs/api-error.log")), "api");
    assert_eq!(origin_from_path(Path::new("/logs/api-out.log")), "api");
    assert_eq!(origin_from_path(Path::new("/logs/api-err.log")), "api");
    assert_eq!(origin_from_path(Path::new("/logs/worker.log")), "worker");
    assert_eq!(
        origin_from_path(Path::new("/logs/my-service-error.log")),
        "my-service"
    );
}

#[test]
fn new_source_skips_existing_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("api-error.log");
    append(&path, "old failure ECONNREFUSED\n");

    let mut source = FileLogSource::new(dir.path().to_path_buf());
    let first = source.poll_sync().expect("first poll");
    assert!(first.is_empty());

    append(&path, "fresh failure ENOSPC\n");
    let second = source.poll_sync().expect("second poll");
    assert_eq!(second, vec![LogLine::new("api", "fresh failure ENOSPC")]);
}

#[test]
fn from_start_reads_existing_content_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("api-out.log");
    append(&path, "line one\n\nline two\n");

    let mut source = FileLogSource::from_start(dir.path().to_path_buf());
    let lines = source.poll_sync().expect("poll");
    assert_eq!(
        lines,
        vec![LogLine::new("api", "line one"), LogLine::new("api", "line two")]
    );

    let again = source.poll_sync().expect("poll again");
    assert!(again.is_empty());
}

#[test]
fn files_created_after_priming_are_read_from_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut source = FileLogSource::new(dir.path().to_path_buf());
    assert!(source.poll_sync().expect("prime").is_empty());

    append(&dir.path().join("worker-error.log"), "heap out of memory\n");
    let lines = source.poll_sync().expect("poll");
    assert_eq!(lines, vec![LogLine::new("worker", "heap out of memory")]);
}

#[test]
fn truncated_file_is_reread_from_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("api-error.log");
    append(&path, "a fairly long first line\n");

    let mut source = FileLogSource::from_start(dir.path().to_path_buf());
    assert_eq!(source.poll_sync().expect("poll").len(), 1);

    std::fs::write(&path, "short\n").expect("truncate");
    let lines = source.poll_sync().expect("poll after truncate");
    assert_eq!(lines, vec![LogLine::new("api", "short")]);
}

#[test]
fn invalid_utf8_is_replaced_and_tailing_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let api = dir.path().join("api-error.log");
    let worker = dir.path().join("worker-out.log");
    let mut source = FileLogSource::new(dir.path().to_path_buf());
    assert!(source.poll_sync().expect("prime").is_empty());

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&api)
        .expect("open log file");
    file.write_all(b"bad \xff\xfe bytes\n").expect("append raw bytes");
    append(&api, "connect ECONNREFUSED 10.0.0.7:5432\n");
    append(&worker, "worker ready\n");

    let lines = source.poll_sync().expect("poll with invalid bytes");
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].origin, "api");
    assert!(lines[0].text.starts_with("bad "));
    assert!(lines[0].text.contains('\u{FFFD}'));
    assert_eq!(lines[1], LogLine::new("api", "connect ECONNREFUSED 10.0.0.7:5432"));
    assert_eq!(lines[2], LogLine::new("worker", "worker ready"));

    append(&api, "read ETIMEDOUT\n");
    let next = source.poll_sync().expect("later poll");
    assert_eq!(next, vec![LogLine::new("api", "read ETIMEDOUT")]);
}

#[test]
fn non_log_files_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    append(&dir.path().join("notes.txt"), "ECONNREFUSED\n");

    let mut source = FileLogSource::from_start(dir.path().to_path_buf());
    assert!(source.poll_sync().expect("poll").is_empty());
}

#[test]
fn missing_directory_yields_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut source = FileLogSource::from_start(dir.path().join("absent"));
    assert!(source.poll_sync().expect("poll").is_empty());
}

#[tokio::test]
async fn channel_source_drains_pending_lines() {
    let (tx, mut source) = ChannelLogSource::channel(8);
    tx.send(LogLine::new("api", "first")).await.expect("send");
    tx.send(LogLine::new("api", "second")).await.expect("send");

    let lines = source.poll().await.expect("poll");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].text, "second");

    assert!(source.poll().await.expect("poll").is_empty());
}
