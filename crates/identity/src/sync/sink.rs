//! Run outcome accounting and the failure log
//!
//! Failures are appended to a JSON-lines log as they happen, one entry per
//! line, so a run killed midway keeps everything logged so far. The same
//! entries can optionally be exported as a single JSON array when the run
//! completes. Either file can be fed back in to re-drive the failed records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::RecordId;
use crate::provider::ProviderError;

/// Error detail captured for a failed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// HTTP status, absent for transport failures
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl From<&ProviderError> for ErrorDetail {
    fn from(error: &ProviderError) -> Self {
        match error {
            ProviderError::Status {
                status,
                code,
                message,
                ..
            } => Self {
                status: Some(*status),
                code: code.clone(),
                message: message.clone(),
            },
            other => Self {
                status: None,
                code: None,
                message: other.to_string(),
            },
        }
    }
}

/// One failed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureLogEntry {
    pub record_id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

impl FailureLogEntry {
    pub fn new(record_id: RecordId, error: &ProviderError) -> Self {
        Self {
            record_id,
            timestamp: Utc::now(),
            error: error.into(),
        }
    }
}

/// Counters for one run, owned by the batch driver
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunTally {
    pub processed: usize,
    pub succeeded: usize,
    pub conflicted: usize,
    pub failed: usize,
    /// Rate-limited attempts waited out across all records
    pub rate_limit_waits: u64,
}

/// Final, immutable result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub conflicted: usize,
    pub failed: usize,
    pub rate_limit_waits: u64,
    pub duration_ms: u64,
    /// Where failures were logged, if anywhere
    pub failure_log: Option<PathBuf>,
}

/// Append-only JSON-lines file, opened on the first failure
struct FailureLog {
    path: PathBuf,
    file: Option<File>,
}

impl FailureLog {
    fn append(&mut self, entry: &FailureLogEntry) -> Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .with_context(|| format!("Failed to open failure log: {}", self.path.display()))?,
        };
        let file = self.file.insert(file);

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .with_context(|| format!("Failed to append to failure log: {}", self.path.display()))
    }
}

/// Collects per-record failures and produces the run summary
pub struct OutcomeSink {
    log: Option<FailureLog>,
    export: Option<PathBuf>,
    entries: Vec<FailureLogEntry>,
}

impl OutcomeSink {
    /// A sink that only keeps failures in memory
    pub fn in_memory() -> Self {
        Self {
            log: None,
            export: None,
            entries: Vec::new(),
        }
    }

    /// A sink appending failures to a JSON-lines file
    ///
    /// The file is only created once there is a failure to write; an
    /// existing file is appended to.
    pub fn to_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        Ok(Self {
            log: Some(FailureLog { path, file: None }),
            export: None,
            entries: Vec::new(),
        })
    }

    /// Also write all failures as one JSON array when the run finishes
    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export = Some(path.into());
        self
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(|log| log.path.as_path())
    }

    /// Failures recorded so far
    pub fn entries(&self) -> &[FailureLogEntry] {
        &self.entries
    }

    /// Append one failure; the write reaches the file before this returns
    pub fn record_failure(&mut self, entry: FailureLogEntry) -> Result<()> {
        if let Some(log) = &mut self.log {
            log.append(&entry)?;
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Flush, write the export if configured, and freeze the counters
    ///
    /// The summary names the failure log only if this run wrote to it.
    pub fn finalize(self, tally: RunTally, elapsed: Duration) -> Result<RunSummary> {
        if let Some(FailureLog { path, file: Some(file) }) = &self.log {
            file.sync_all()
                .with_context(|| format!("Failed to sync failure log: {}", path.display()))?;
        }
        if let Some(export) = &self.export {
            config::save_json_file(export, &self.entries)?;
            info!("Wrote {} failure(s) to {}", self.entries.len(), export.display());
        }

        Ok(RunSummary {
            processed: tally.processed,
            succeeded: tally.succeeded,
            conflicted: tally.conflicted,
            failed: tally.failed,
            rate_limit_waits: tally.rate_limit_waits,
            duration_ms: elapsed.as_millis() as u64,
            failure_log: self.log.filter(|log| log.file.is_some()).map(|log| log.path),
        })
    }
}

/// Read failures back from a JSON-lines log or a JSON array export
pub fn read_failure_log(path: &Path) -> Result<Vec<FailureLogEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read failure log: {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse failure log: {}", path.display()));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| {
                format!("Failed to parse failure log {} line {}", path.display(), n + 1)
            })
        })
        .collect()
}
