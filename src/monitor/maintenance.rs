//! Expired-artifact cleanup.

use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tracing::{debug, info, warn};

/// Delete log files in `logs_dir` whose modification time is older than
/// `retention_days`. Returns the number of files removed.
///
/// Only `.log`, `.jsonl`, and `.txt` files and rotated `*.log.YYYY-MM-DD`
/// files are considered. A missing directory is not an error.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be listed.
pub fn prune_logs(logs_dir: &Path, retention_days: u64) -> anyhow::Result<u64> {
    if !logs_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let retention = Duration::from_secs(retention_days.saturating_mul(86400));

    let entries = std::fs::read_dir(logs_dir)
        .with_context(|| format!("failed to read logs directory {}", logs_dir.display()))?;

    let mut pruned_count: u64 = 0;

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let path = entry.path();
        if !is_log_file(&path) {
            continue;
        }

        let Ok(modified) = metadata.modified() else {
            continue;
        };

        let age = now.duration_since(modified).unwrap_or_default();
        if age > retention {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to prune log file");
            } else {
                pruned_count = pruned_count.saturating_add(1);
            }
        }
    }

    if pruned_count > 0 {
        info!(count = pruned_count, retention_days, dir = %logs_dir.display(), "pruned old log files");
    } else {
        debug!(retention_days, dir = %logs_dir.display(), "no expired log files");
    }
    Ok(pruned_count)
}

fn is_log_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "jsonl" | "log" | "txt"));
    by_extension || name.contains(".log.")
}
