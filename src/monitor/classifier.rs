//! Log classifier: known failure signatures and their remediation.
//!
//! Each line is tested independently against every [`Category`]; a line
//! can match several. Within one poll batch the matches are aggregated so
//! each category's remediation runs once, with the match count and the
//! latest matching line in its alert.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};

use super::maintenance::prune_logs;
use super::report::{Report, Severity};
use crate::controller::{ControllerError, ProcessController};
use crate::logsource::LogLine;
use crate::sink::Notifier;

/// Failure signature found in an application log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Heap or allocator exhaustion.
    MemoryLeak,
    /// Refused or timed-out connections.
    NetworkError,
    /// Full filesystem.
    DiskSpace,
}

impl Category {
    /// Every category, in match order.
    pub const ALL: [Category; 3] = [Self::MemoryLeak, Self::NetworkError, Self::DiskSpace];

    fn signature(self) -> &'static str {
        match self {
            Self::MemoryLeak => r"(?i)heap out of memory|out of memory|memory allocation failed",
            Self::NetworkError => {
                r"(?i)ECONNREFUSED|ETIMEDOUT|ECONNRESET|connection refused|connection timed out"
            }
            Self::DiskSpace => r"(?i)no space left on device|ENOSPC",
        }
    }

    /// Whether `line` carries this signature.
    pub fn matches(self, line: &str) -> bool {
        PATTERNS
            .iter()
            .any(|(category, regex)| *category == self && regex.is_match(line))
    }

    /// Alert subject for this category.
    pub fn subject(self) -> &'static str {
        match self {
            Self::MemoryLeak => "Memory Leak Detected",
            Self::NetworkError => "Network Error",
            Self::DiskSpace => "Disk Space Alert",
        }
    }

    /// Alert lead text for this category.
    pub fn description(self) -> &'static str {
        match self {
            Self::MemoryLeak => "Potential memory leak detected in application",
            Self::NetworkError => "Network connectivity issues detected",
            Self::DiskSpace => "Low disk space detected",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryLeak => f.write_str("memory_leak"),
            Self::NetworkError => f.write_str("network_error"),
            Self::DiskSpace => f.write_str("disk_space"),
        }
    }
}

static PATTERNS: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    Category::ALL
        .into_iter()
        .filter_map(|category| match Regex::new(category.signature()) {
            Ok(regex) => Some((category, regex)),
            Err(e) => {
                error!(category = %category, error = %e, "log signature failed to compile");
                None
            }
        })
        .collect()
});

/// Categories whose signature appears in `line`.
pub fn classify(line: &str) -> BTreeSet<Category> {
    Category::ALL
        .into_iter()
        .filter(|category| category.matches(line))
        .collect()
}

/// Settings for [`Remediator`].
#[derive(Debug, Clone)]
pub struct RemediationSettings {
    /// Only lines from this process are classified.
    pub app_name: String,
    /// URL fetched to confirm outbound connectivity.
    pub connectivity_url: String,
    /// Directories purged of old logs on disk-space signatures.
    pub purge_dirs: Vec<PathBuf>,
    /// Log retention used by the purge.
    pub retention_days: u64,
}

/// Matches for one category within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryHits {
    /// Number of matching lines.
    pub count: usize,
    /// Most recent matching line.
    pub latest: String,
}

/// Runs category-specific remediation for classified log lines.
pub struct Remediator {
    settings: RemediationSettings,
    notifier: Notifier,
    controller: Arc<dyn ProcessController>,
    client: reqwest::Client,
}

impl Remediator {
    /// Create a remediator.
    pub fn new(
        settings: RemediationSettings,
        notifier: Notifier,
        controller: Arc<dyn ProcessController>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            settings,
            notifier,
            controller,
            client,
        }
    }

    /// Classify a batch of lines from the application's origin.
    pub fn collect(&self, lines: &[LogLine]) -> BTreeMap<Category, CategoryHits> {
        let mut hits: BTreeMap<Category, CategoryHits> = BTreeMap::new();
        for line in lines
            .iter()
            .filter(|line| line.origin == self.settings.app_name)
        {
            let categories = classify(&line.text);
            if categories.is_empty() {
                continue;
            }
            error!(origin = %line.origin, line = %line.text, "application error");
            for category in categories {
                let entry = hits.entry(category).or_insert_with(|| CategoryHits {
                    count: 0,
                    latest: String::new(),
                });
                entry.count = entry.count.saturating_add(1);
                entry.latest.clone_from(&line.text);
            }
        }
        hits
    }

    /// Classify `lines` and run each matched category's remediation once.
    ///
    /// Remediations run concurrently; one failing does not stop the others.
    /// Returns the categories that were handled.
    pub async fn process(&self, lines: &[LogLine]) -> BTreeMap<Category, CategoryHits> {
        let hits = self.collect(lines);
        let results = join_all(
            hits.iter()
                .map(|(category, hit)| async move { (*category, self.remediate(*category, hit).await) }),
        )
        .await;

        for (category, result) in results {
            if let Err(e) = result {
                warn!(category = %category, error = %e, "remediation failed");
            }
        }
        hits
    }

    /// Alert plus the category's mitigation.
    ///
    /// # Errors
    ///
    /// Returns an error if the mitigation step fails; the alert has already
    /// been attempted by then.
    pub async fn remediate(&self, category: Category, hits: &CategoryHits) -> anyhow::Result<()> {
        let report = Report::message(category.subject(), Severity::Warning, category.description())
            .with_note(format!(
                "{} matching line(s); latest: {}",
                hits.count, hits.latest
            ));
        self.notifier.notify(category.subject(), report).await;

        match category {
            Category::MemoryLeak => self.capture_heap_dump().await,
            Category::NetworkError => {
                self.check_connectivity().await;
                Ok(())
            }
            Category::DiskSpace => self.purge_old_logs(),
        }
    }

    async fn capture_heap_dump(&self) -> anyhow::Result<()> {
        let app = &self.settings.app_name;
        info!(app = %app, "generating heap dump for analysis");
        match self.controller.heap_dump(app).await {
            Ok(output) => {
                info!(app = %app, output = %output, "heap dump captured");
                Ok(())
            }
            Err(ControllerError::Unsupported(kind)) => {
                info!(app = %app, controller = kind, "no heap dump command configured");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("heap dump failed: {e}")),
        }
    }

    /// Fetch the connectivity URL; raise a critical alert when it fails.
    pub async fn check_connectivity(&self) -> bool {
        let result = self
            .client
            .get(&self.settings.connectivity_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match result {
            Ok(response) => {
                info!(status = %response.status(), "network connectivity check passed");
                true
            }
            Err(e) => {
                error!(error = %e, "network connectivity check failed");
                self.notifier
                    .notify(
                        "Critical Alert",
                        Report::message(
                            "Critical Alert",
                            Severity::Critical,
                            "Network connectivity issues detected",
                        ),
                    )
                    .await;
                false
            }
        }
    }

    fn purge_old_logs(&self) -> anyhow::Result<()> {
        for dir in &self.settings.purge_dirs {
            prune_logs(dir, self.settings.retention_days)?;
        }
        Ok(())
    }
}
