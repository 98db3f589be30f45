//! Validation run orchestration.
//!
//! A run is an explicit [`ValidationSession`] value moved through step
//! functions; nothing is kept in global state, so a caller can persist the
//! session between invocations and resume.
//!
//! ```text
//!  Ready ──submit──▶ Submitted ──poll_once*──▶ Finished ──fetch_results──▶ merge
//!    │                   │  │
//!    │ rejected          │  └─ bound exhausted ──▶ TimedOut
//!    ▼                   ▼
//!  Failed ◀──── ERROR / failed poll
//! ```
//!
//! The service reports `NEW → PROCESSING → UNIQUE_RESULTS → FINALIZING →
//! FINISHED`, or `ERROR` from any state. Only `FINISHED` and `ERROR` end the
//! poll loop; unknown statuses keep it running.
//!
//! Exactly one audit entry is appended per run, at whichever terminal
//! transition happens: rejected submission, `FINISHED`, `ERROR`, failed poll,
//! or poll bound exhausted.

pub mod history;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::api::logs::{log_error, log_info, log_progress, log_success, log_warning};
use crate::audit::{AuditEntry, AuditSink};
use crate::client::{StatusResponse, SubmitResponse, ValidationApi};
use crate::error::{WorkflowError, WorkflowResult};
use crate::export::batch_name;
use crate::models::{ContactTable, JobStatus};
use crate::parser::LoadedTable;
use crate::transform::dedup::{dedupe, duplicate_report, submission_rows, DuplicateReport};
use crate::transform::merge::{labelled_count, merge_labels};
use crate::validation::{label_index, ValidationRecord};

pub use history::{fetch_history, HistoryEntry};

/// Poll cadence and bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two polls
    pub interval: Duration,
    /// Give up after this many polls; `None` polls until a terminal status
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: Some(1800),
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum Phase {
    /// Prepared, not yet submitted
    Ready,
    /// Accepted by the service, polling
    #[serde(rename_all = "camelCase")]
    Submitted { job_id: String },
    /// Job reached `FINISHED`
    #[serde(rename_all = "camelCase")]
    Finished { download_link: Option<String> },
    /// Rejected submission, `ERROR` status, or failed poll
    Failed { reason: String },
    /// Poll bound exhausted
    TimedOut { attempts: u32 },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Ready => "ready",
            Phase::Submitted { .. } => "submitted",
            Phase::Finished { .. } => "finished",
            Phase::Failed { .. } => "failed",
            Phase::TimedOut { .. } => "timed out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished { .. } | Phase::Failed { .. } | Phase::TimedOut { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSession {
    pub run_id: Uuid,
    /// Upper-cased account name
    pub account: String,
    /// Uploaded file name
    pub source_name: String,
    /// `{ACCOUNT}_{stem}`, submitted as `{batch_name}.csv`
    pub batch_name: String,
    pub email_column: String,
    /// Uploaded rows, untouched
    pub table: ContactTable,
    pub duplicates: DuplicateReport,
    /// Deduplicated rows submitted to the service
    pub batch: ContactTable,
    pub phase: Phase,
    pub submit: Option<SubmitResponse>,
    pub last_status: Option<StatusResponse>,
    pub poll_attempts: u32,
    pub records: Option<Vec<ValidationRecord>>,
    /// Why the result file of a finished job could not be fetched
    #[serde(default)]
    pub result_error: Option<String>,
    /// Uploaded rows with the label column
    pub annotated: Option<ContactTable>,
    pub merge_passes: u32,
    pub audit_entry: Option<AuditEntry>,
}

impl ValidationSession {
    /// Prepare a run from a loaded upload: resolve the email column, report
    /// duplicates and build the deduplicated batch.
    pub fn prepare(account: &str, source_name: &str, loaded: &LoadedTable) -> WorkflowResult<Self> {
        let email_column = loaded.require_email_column()?.to_string();
        let table = loaded.table.clone();
        let duplicates = duplicate_report(&table, &email_column);
        let batch = dedupe(&table, &email_column);

        if batch.is_empty() {
            return Err(WorkflowError::EmptyBatch);
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            account: account.trim().to_uppercase(),
            source_name: source_name.to_string(),
            batch_name: batch_name(account, source_name),
            email_column,
            table,
            duplicates,
            batch,
            phase: Phase::Ready,
            submit: None,
            last_status: None,
            poll_attempts: 0,
            records: None,
            result_error: None,
            annotated: None,
            merge_passes: 0,
            audit_entry: None,
        })
    }

    /// Name the batch is submitted under.
    pub fn submit_file_name(&self) -> String {
        format!("{}.csv", self.batch_name)
    }

    pub fn job_id(&self) -> Option<&str> {
        self.submit.as_ref().and_then(|s| s.id.as_deref())
    }

    /// Finished with labels merged into the upload.
    pub fn is_success(&self) -> bool {
        matches!(self.phase, Phase::Finished { .. }) && self.annotated.is_some()
    }

    fn invalid_phase(&self, step: &'static str) -> WorkflowError {
        WorkflowError::InvalidPhase {
            step,
            phase: self.phase.to_string(),
        }
    }
}

/// Append the run's audit entry. Best effort, at most once per session.
async fn record_audit(audit: &dyn AuditSink, session: &mut ValidationSession, entry: AuditEntry) {
    if session.audit_entry.is_some() {
        return;
    }
    if let Err(e) = audit.append(&entry).await {
        log_warning(format!("Audit log append failed: {}", e));
    }
    session.audit_entry = Some(entry);
}

/// Submit the deduplicated batch once.
///
/// A rejected or failed submission moves the session to [`Phase::Failed`]
/// and writes the audit entry; polling never starts.
pub async fn submit(
    api: &dyn ValidationApi,
    audit: &dyn AuditSink,
    mut session: ValidationSession,
) -> WorkflowResult<ValidationSession> {
    if session.phase != Phase::Ready {
        return Err(session.invalid_phase("submit"));
    }

    let rows = submission_rows(&session.batch, &session.email_column);
    log_info(format!(
        "📤 Submitting {} unique email addresses as {}",
        rows.len(),
        session.submit_file_name()
    ));

    let response = match api.submit_batch(&session.submit_file_name(), &rows).await {
        Ok(response) => response,
        Err(e) => SubmitResponse {
            success: false,
            message: e.to_string(),
            ..Default::default()
        },
    };

    match (response.success, response.id.clone()) {
        (true, Some(job_id)) => {
            log_success(format!("Batch accepted, job id {}", job_id));
            session.phase = Phase::Submitted { job_id };
            session.submit = Some(response);
        }
        _ => {
            log_error("CSV upload failed.");
            log_error(format!("Error message: {}", response.message));
            let entry = AuditEntry::submit_failed(&session.batch_name, &response);
            session.phase = Phase::Failed {
                reason: format!("submission failed: {}", response.message),
            };
            session.submit = Some(response);
            record_audit(audit, &mut session, entry).await;
        }
    }

    Ok(session)
}

/// Poll the job once and apply the transition.
///
/// Non-terminal statuses leave the session in [`Phase::Submitted`] unless the
/// poll bound is reached, in which case it becomes [`Phase::TimedOut`].
pub async fn poll_once(
    api: &dyn ValidationApi,
    audit: &dyn AuditSink,
    mut session: ValidationSession,
    policy: &PollPolicy,
) -> WorkflowResult<ValidationSession> {
    let Phase::Submitted { job_id } = session.phase.clone() else {
        return Err(session.invalid_phase("poll"));
    };
    let submit = session.submit.clone().unwrap_or_default();
    session.poll_attempts += 1;

    let status = match api.poll_status(&job_id).await {
        Ok(status) => status,
        Err(e) => {
            log_error(format!("Status check failed: {}", e));
            let entry = AuditEntry::poll_error(&session.batch_name, &submit, &job_id, &e.to_string());
            session.phase = Phase::Failed {
                reason: format!("status check failed: {}", e),
            };
            record_audit(audit, &mut session, entry).await;
            return Ok(session);
        }
    };
    session.last_status = Some(status.clone());

    if !status.success {
        log_error(format!("Status check rejected: {}", status.message));
        let entry = AuditEntry::polled(&session.batch_name, &submit, &job_id, &status);
        session.phase = Phase::Failed {
            reason: format!("status check rejected: {}", status.message),
        };
        record_audit(audit, &mut session, entry).await;
        return Ok(session);
    }

    let job_status = status
        .status
        .clone()
        .unwrap_or_else(|| JobStatus::Unknown(String::new()));
    let (message, percent) = job_status.progress();
    log_progress(message, percent);

    match job_status {
        JobStatus::Finished => {
            log_success("CSV processing is finished.");
            let download_link = status.download_link().map(str::to_string);
            if download_link.is_none() {
                log_warning("No download link available yet. Please check again later.");
            }
            let entry = AuditEntry::polled(&session.batch_name, &submit, &job_id, &status);
            session.phase = Phase::Finished { download_link };
            record_audit(audit, &mut session, entry).await;
        }
        JobStatus::Error => {
            log_error("CSV processing encountered an error. Please check again later.");
            let entry = AuditEntry::polled(&session.batch_name, &submit, &job_id, &status);
            session.phase = Phase::Failed {
                reason: "job reported ERROR".to_string(),
            };
            record_audit(audit, &mut session, entry).await;
        }
        _ => {
            if let Some(max) = policy.max_attempts {
                if session.poll_attempts >= max {
                    log_error(format!("No terminal status after {} polls, giving up", max));
                    let entry = AuditEntry::timed_out(
                        &session.batch_name,
                        &submit,
                        &job_id,
                        session.poll_attempts,
                    );
                    session.phase = Phase::TimedOut {
                        attempts: session.poll_attempts,
                    };
                    record_audit(audit, &mut session, entry).await;
                }
            }
        }
    }

    Ok(session)
}

/// Poll with the policy's delay until the session leaves [`Phase::Submitted`].
pub async fn poll_until_terminal(
    api: &dyn ValidationApi,
    audit: &dyn AuditSink,
    mut session: ValidationSession,
    policy: &PollPolicy,
) -> WorkflowResult<ValidationSession> {
    loop {
        session = poll_once(api, audit, session, policy).await?;
        if !matches!(session.phase, Phase::Submitted { .. }) {
            return Ok(session);
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// Download and parse the result file of a finished job.
///
/// Without a download link the session is returned unchanged: no records,
/// nothing to merge. A failed download is recorded in `result_error` and
/// the session stays `Finished`, keeping its job id and link for a retry.
pub async fn fetch_results(
    api: &dyn ValidationApi,
    mut session: ValidationSession,
) -> WorkflowResult<ValidationSession> {
    let Phase::Finished { download_link } = &session.phase else {
        return Err(session.invalid_phase("fetch results"));
    };
    let Some(url) = download_link.clone() else {
        return Ok(session);
    };

    log_info("📥 Downloading validation results...");
    match api.fetch_results(&url).await {
        Ok(records) => {
            log_success(format!("{} validation records", records.len()));
            session.records = Some(records);
            session.result_error = None;
        }
        Err(e) => {
            log_warning(format!("Cannot download results from {}: {}", url, e));
            session.result_error = Some(e.to_string());
        }
    }
    Ok(session)
}

/// Merge derived labels into the uploaded rows.
pub fn merge(mut session: ValidationSession) -> WorkflowResult<ValidationSession> {
    let Some(records) = &session.records else {
        return Err(session.invalid_phase("merge"));
    };

    let labels = label_index(records);
    let annotated = merge_labels(&session.table, &session.email_column, &labels);
    let labelled = labelled_count(&annotated);
    log_success(format!(
        "IPQS Validation column added: {}/{} rows labelled",
        labelled,
        annotated.len()
    ));

    session.annotated = Some(annotated);
    session.merge_passes += 1;
    Ok(session)
}

/// Drive a prepared session to completion.
pub async fn run(
    api: &dyn ValidationApi,
    audit: &dyn AuditSink,
    session: ValidationSession,
    policy: &PollPolicy,
) -> WorkflowResult<ValidationSession> {
    if !session.duplicates.is_empty() {
        log_warning(format!(
            "Total {} duplicate email addresses found; only unique addresses are submitted.",
            session.duplicates.rows.len()
        ));
    }

    let mut session = submit(api, audit, session).await?;
    if matches!(session.phase, Phase::Submitted { .. }) {
        session = poll_until_terminal(api, audit, session, policy).await?;
    }
    if matches!(session.phase, Phase::Finished { .. }) {
        session = fetch_results(api, session).await?;
        if session.records.is_some() {
            session = merge(session)?;
        }
    }
    Ok(session)
}
