//! Application log sources.
//!
//! A [`LogSource`] yields text lines tagged with the process that wrote
//! them. [`FileLogSource`] tails a directory of pm2-style log files
//! (`<process>-error.log`, `<process>-out.log`); [`ChannelLogSource`]
//! drains lines pushed by an embedding program.
//! File reads use synchronous `std::fs` since these are quick local operations.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// Lines longer than this are skipped.
const MAX_LINE_LEN: usize = 1_048_576;

/// A log line and the process that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Emitting process name.
    pub origin: String,
    /// Line text without the trailing newline.
    pub text: String,
}

impl LogLine {
    /// Create a log line.
    pub fn new(origin: &str, text: &str) -> Self {
        Self {
            origin: origin.to_owned(),
            text: text.to_owned(),
        }
    }
}

/// Source of application log lines.
#[async_trait]
pub trait LogSource: Send {
    /// Return lines emitted since the previous poll.
    async fn poll(&mut self) -> anyhow::Result<Vec<LogLine>>;
}

/// Tails every `*.log` file in a directory.
///
/// Tracks a byte offset per file so each line is returned once. Files
/// present at the first poll are read from their end unless the source was
/// built with [`FileLogSource::from_start`]; files appearing later are read
/// from the beginning.
pub struct FileLogSource {
    dir: PathBuf,
    offsets: HashMap<PathBuf, u64>,
    primed: bool,
}

impl FileLogSource {
    /// Tail new lines only.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            offsets: HashMap::new(),
            primed: false,
        }
    }

    /// Read existing content on the first poll as well.
    pub fn from_start(dir: PathBuf) -> Self {
        Self {
            dir,
            offsets: HashMap::new(),
            primed: true,
        }
    }

    /// Synchronous poll used by the async trait impl.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed. A file that
    /// cannot be read is logged and skipped until the next poll.
    pub fn poll_sync(&mut self) -> anyhow::Result<Vec<LogLine>> {
        let files = list_log_files(&self.dir)?;
        let mut lines = Vec::new();

        if !self.primed {
            for path in files {
                match fs::metadata(&path) {
                    Ok(meta) => {
                        self.offsets.insert(path, meta.len());
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read log file metadata");
                    }
                }
            }
            self.primed = true;
            return Ok(lines);
        }

        for path in files {
            let origin = origin_from_path(&path);
            let offset = self.offsets.get(&path).copied().unwrap_or(0);
            let (new_lines, new_offset) = match read_from(&path, offset) {
                Ok(read) => read,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable log file");
                    continue;
                }
            };
            self.offsets.insert(path, new_offset);
            lines.extend(new_lines.into_iter().map(|text| LogLine {
                origin: origin.clone(),
                text,
            }));
        }

        Ok(lines)
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn poll(&mut self) -> anyhow::Result<Vec<LogLine>> {
        self.poll_sync()
    }
}

/// Read complete lines from `offset`, returning them and the new offset.
fn read_from(path: &Path, offset: u64) -> anyhow::Result<(Vec<String>, u64)> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let file_len = file
        .metadata()
        .with_context(|| format!("failed to read metadata for {}", path.display()))?
        .len();

    // If the file shrank (rotation or truncation), start over.
    let offset = if file_len < offset { 0 } else { offset };
    if file_len == offset {
        return Ok((Vec::new(), offset));
    }

    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(offset))
        .with_context(|| format!("failed to seek in log file {}", path.display()))?;

    let mut lines = Vec::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut raw)
            .with_context(|| format!("failed to read line from {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        if raw.len() > MAX_LINE_LEN {
            continue;
        }
        let line = String::from_utf8_lossy(&raw);
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if !trimmed.trim().is_empty() {
            lines.push(trimmed.to_owned());
        }
    }

    let position = reader
        .stream_position()
        .context("failed to get stream position")?;
    Ok((lines, position))
}

fn list_log_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read log directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.context("failed to read directory entry")?;
        let path = entry.path();
        let is_log = path.extension().and_then(|ext| ext.to_str()) == Some("log");
        if is_log && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Process name for a log file: `api-error.log` → `api`, `api.log` → `api`.
pub fn origin_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    ["-error", "-err", "-out"]
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(stem)
        .to_owned()
}

/// Drains lines pushed through a Tokio channel.
pub struct ChannelLogSource {
    rx: mpsc::Receiver<LogLine>,
}

impl ChannelLogSource {
    /// Create a source and the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<LogLine>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl LogSource for ChannelLogSource {
    async fn poll(&mut self) -> anyhow::Result<Vec<LogLine>> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        Ok(lines)
    }
}
