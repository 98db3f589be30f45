//! REST API response bodies.
//!
//! All bodies are camelCase JSON. Generated files travel base64-encoded so a
//! browser can turn them into download links directly.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::{json, Value};

use crate::audit::AuditEntry;
use crate::client::StatusResponse;
use crate::export::Download;
use crate::models::{JobStatus, Label, LABEL_COLUMN};
use crate::parser::{LoadedTable, SourceFormat};
use crate::transform::dedup::{dedupe, duplicate_report, DuplicateReport};
use crate::workflow::{HistoryEntry, Phase, ValidationSession};

/// Rows included in an upload preview.
pub const PREVIEW_ROWS: usize = 20;

/// Response to `POST /api/upload`: what a validation run would submit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub file_name: String,
    pub format: SourceFormat,
    pub encoding: Option<String>,
    pub delimiter: Option<String>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub email_column: Option<String>,
    /// Rows left after dropping blank and repeated emails
    pub unique_emails: usize,
    pub duplicates: DuplicateReport,
    /// First rows as header-keyed objects
    pub rows: Vec<Value>,
}

impl PreviewResponse {
    pub fn new(file_name: &str, loaded: &LoadedTable) -> Self {
        let (unique_emails, duplicates) = match &loaded.email_column {
            Some(column) => (
                dedupe(&loaded.table, column).len(),
                duplicate_report(&loaded.table, column),
            ),
            None => (0, DuplicateReport::default()),
        };

        Self {
            file_name: file_name.to_string(),
            format: loaded.format,
            encoding: loaded.encoding.clone(),
            delimiter: loaded.delimiter.map(|d| d.to_string()),
            row_count: loaded.table.len(),
            columns: loaded.table.headers.clone(),
            email_column: loaded.email_column.clone(),
            unique_emails,
            duplicates,
            rows: loaded.table.to_records().into_iter().take(PREVIEW_ROWS).collect(),
        }
    }
}

/// A generated file, base64-encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedDownload {
    pub file_name: String,
    pub content_base64: String,
}

impl From<&Download> for EncodedDownload {
    fn from(download: &Download) -> Self {
        Self {
            file_name: download.file_name.clone(),
            content_base64: STANDARD.encode(&download.bytes),
        }
    }
}

/// Label counts over the annotated upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStats {
    pub valid: usize,
    pub invalid: usize,
    pub unlabelled: usize,
}

/// Response to `POST /api/validate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub run_id: String,
    /// `"finished"`, `"failed"`, `"timed out"`
    pub status: String,
    pub phase: Phase,
    pub batch_name: String,
    pub job_id: Option<String>,
    pub submitted: usize,
    pub poll_attempts: u32,
    pub duplicates: DuplicateReport,
    pub labels: Option<LabelStats>,
    /// Set when the job finished but its result file could not be fetched
    pub result_error: Option<String>,
    pub audit: Option<AuditEntry>,
    pub downloads: Vec<EncodedDownload>,
}

impl ValidationResponse {
    pub fn new(session: &ValidationSession, downloads: &[Download]) -> Self {
        Self {
            run_id: session.run_id.to_string(),
            status: session.phase.name().to_string(),
            phase: session.phase.clone(),
            batch_name: session.batch_name.clone(),
            job_id: session.job_id().map(str::to_string),
            submitted: session.batch.len(),
            poll_attempts: session.poll_attempts,
            duplicates: session.duplicates.clone(),
            labels: session.annotated.as_ref().map(|table| {
                let mut stats = LabelStats::default();
                for value in table.column_values(LABEL_COLUMN) {
                    match value {
                        v if v == Label::Valid.as_str() => stats.valid += 1,
                        v if v == Label::Invalid.as_str() => stats.invalid += 1,
                        _ => stats.unlabelled += 1,
                    }
                }
                stats
            }),
            result_error: session.result_error.clone(),
            audit: session.audit_entry.clone(),
            downloads: downloads.iter().map(EncodedDownload::from).collect(),
        }
    }
}

/// Response to `GET /api/status/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub job_id: String,
    pub status: String,
    pub message: String,
    pub progress: u8,
    pub progress_message: String,
    pub download_link: Option<String>,
}

impl StatusView {
    pub fn new(job_id: &str, response: &StatusResponse) -> Self {
        let status = response
            .status
            .clone()
            .unwrap_or_else(|| JobStatus::Unknown(String::new()));
        let (progress_message, progress) = status.progress();

        Self {
            job_id: job_id.to_string(),
            status: status.as_str().to_string(),
            message: response.message.clone(),
            progress,
            progress_message: progress_message.to_string(),
            download_link: response.download_link().map(str::to_string),
        }
    }
}

/// Response to `GET /api/batches`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub account: String,
    pub batches: Vec<HistoryEntry>,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
