//! Append-only audit log of validation runs.
//!
//! Exactly one [`AuditEntry`] is written per run, at its terminal transition.
//! Appending is best effort: the workflow logs a warning when a sink fails and
//! carries on.
//!
//! Sinks:
//! - [`SheetsAuditLog`] - first worksheet of the shared Google spreadsheet
//! - [`FileAuditLog`] - local JSON-lines file
//! - [`MemoryAuditLog`] - in-process, for tests and dry runs

pub mod sheets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::client::{StatusResponse, SubmitResponse};
use crate::config::{AuditTarget, Settings};
use crate::error::{AuditResult, ConfigError};

pub use sheets::SheetsAuditLog;

/// Timestamp format of audit rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Status recorded when polling gives up.
pub const TIMEOUT_STATUS: &str = "TIMEOUT";

/// Snapshot of one validation run, written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: String,
    pub request_id: String,
    pub filename: String,
    pub job_id: String,
    pub submit_success: bool,
    pub submit_message: String,
    /// `None` when no poll happened (submission failed)
    pub poll_success: Option<bool>,
    pub status: String,
    pub status_message: String,
}

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

impl AuditEntry {
    /// Submission was rejected or failed: no job, no poll.
    pub fn submit_failed(filename: &str, submit: &SubmitResponse) -> Self {
        Self {
            timestamp: now(),
            request_id: submit.request_id.clone(),
            filename: filename.to_string(),
            job_id: String::new(),
            submit_success: false,
            submit_message: submit.message.clone(),
            poll_success: None,
            status: String::new(),
            status_message: String::new(),
        }
    }

    /// Last poll observed by the run.
    pub fn polled(filename: &str, submit: &SubmitResponse, job_id: &str, status: &StatusResponse) -> Self {
        Self {
            timestamp: now(),
            request_id: submit.request_id.clone(),
            filename: filename.to_string(),
            job_id: job_id.to_string(),
            submit_success: submit.success,
            submit_message: submit.message.clone(),
            poll_success: Some(status.success),
            status: status.status_str().to_string(),
            status_message: status.message.clone(),
        }
    }

    /// Poll request itself failed (transport or decoding).
    pub fn poll_error(filename: &str, submit: &SubmitResponse, job_id: &str, message: &str) -> Self {
        Self {
            timestamp: now(),
            request_id: submit.request_id.clone(),
            filename: filename.to_string(),
            job_id: job_id.to_string(),
            submit_success: submit.success,
            submit_message: submit.message.clone(),
            poll_success: Some(false),
            status: String::new(),
            status_message: message.to_string(),
        }
    }

    /// Poll bound exhausted without a terminal status.
    pub fn timed_out(filename: &str, submit: &SubmitResponse, job_id: &str, attempts: u32) -> Self {
        Self {
            timestamp: now(),
            request_id: submit.request_id.clone(),
            filename: filename.to_string(),
            job_id: job_id.to_string(),
            submit_success: submit.success,
            submit_message: submit.message.clone(),
            poll_success: Some(true),
            status: TIMEOUT_STATUS.to_string(),
            status_message: format!("No terminal status after {} polls", attempts),
        }
    }

    /// Row in sheet column order.
    pub fn row(&self) -> Vec<Value> {
        vec![
            Value::String(self.timestamp.clone()),
            Value::String(self.request_id.clone()),
            Value::String(self.filename.clone()),
            Value::String(self.job_id.clone()),
            Value::Bool(self.submit_success),
            Value::String(self.submit_message.clone()),
            self.poll_success.map(Value::Bool).unwrap_or_else(|| Value::String(String::new())),
            Value::String(self.status.clone()),
            Value::String(self.status_message.clone()),
        ]
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;
}

/// Build the sink configured in `settings`.
pub fn sink_from_settings(settings: &Settings) -> Result<Arc<dyn AuditSink>, ConfigError> {
    Ok(match &settings.audit {
        AuditTarget::Sheets { credentials_json, spreadsheet_id } => {
            Arc::new(SheetsAuditLog::from_json(
                credentials_json,
                spreadsheet_id,
                &settings.timeouts,
            )?)
        }
        AuditTarget::File(path) => Arc::new(FileAuditLog::new(path)),
    })
}

// =============================================================================
// File sink
// =============================================================================

/// Appends one JSON object per line.
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Read back every entry (skipping malformed lines).
    pub fn read_all(&self) -> AuditResult<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[async_trait]
impl AuditSink for FileAuditLog {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

// =============================================================================
// Memory sink
// =============================================================================

/// Keeps entries in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(())
    }
}
