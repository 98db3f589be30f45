//! Error types for the IPQS validation workflow.
//!
//! One enum per layer:
//!
//! - [`ConfigError`] - missing or invalid environment configuration (fatal)
//! - [`InputError`] - uploaded file problems (recoverable, operator is warned)
//! - [`ClientError`] - validation service transport / decoding errors
//! - [`AuditError`] - audit log append failures (best effort)
//! - [`ExportError`] - spreadsheet writing errors
//! - [`WorkflowError`] - orchestrator errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Conversion is via `From`, so `?` works across layer boundaries.
//!
//! Rejected submissions, `ERROR` job statuses and missing download links are
//! not errors: they are terminal phases of a run, see [`crate::workflow::Phase`].

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// API key for the validation service is not set.
    #[error("Missing IPQS_API_KEY environment variable")]
    MissingApiKey,

    /// Neither a Google service account nor a local audit file is configured.
    #[error("Missing audit credential: set GOOGLE_JSON or IPQS_AUDIT_LOG")]
    MissingAuditCredential,

    /// An environment variable is present but cannot be parsed.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    /// Service account JSON is malformed.
    #[error("Invalid service account credential: {0}")]
    InvalidCredential(String),

    /// HTTP client could not be built from the configured timeouts.
    #[error("Cannot build HTTP client: {0}")]
    HttpClient(String),
}

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while loading an uploaded contact file.
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// File extension is neither delimited text nor a spreadsheet.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// File has no header row.
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// Delimited text could not be parsed.
    #[error("Invalid CSV format: {0}")]
    Csv(String),

    /// Spreadsheet could not be opened or read.
    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),

    /// None of the recognised email headers is present.
    #[error("No email column found (expected one of: {expected})")]
    MissingEmailColumn { expected: String },
}

// =============================================================================
// Validation Client Errors
// =============================================================================

/// Errors from the validation service client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP client could not be built.
    #[error("Cannot build HTTP client: {0}")]
    Build(String),

    /// HTTP request could not be sent or the body could not be read.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Service answered `"success": false` where no fallback exists.
    #[error("Request rejected by the validation service: {0}")]
    Rejected(String),

    /// Service answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Response body is not the expected JSON.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// Result file could not be parsed.
    #[error("Invalid result file: {0}")]
    InvalidResultFile(String),
}

// =============================================================================
// Audit Errors
// =============================================================================

/// Errors while appending to the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Credential could not be used to sign a token.
    #[error("Audit credential error: {0}")]
    Credential(String),

    /// Token exchange or append request failed.
    #[error("Audit request failed: {0}")]
    Request(String),

    /// IO error (file sink).
    #[error("Audit IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Audit JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while producing downloadable files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Spreadsheet writer failed.
    #[error("Spreadsheet export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// CSV writer failed.
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Workflow Errors (top-level)
// =============================================================================

/// Orchestration errors.
///
/// These abort a step outright; they are distinct from the terminal phases
/// a run can legitimately end in.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input error.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Client error.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Step called in a phase that does not allow it.
    #[error("Cannot {step} while session is {phase}")]
    InvalidPhase { step: &'static str, phase: String },

    /// Nothing left to submit after deduplication.
    #[error("No email addresses to submit")]
    EmptyBatch,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Workflow error.
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // InputError -> WorkflowError
        let input_err = InputError::EmptyFile;
        let workflow_err: WorkflowError = input_err.into();
        assert!(workflow_err.to_string().contains("empty"));

        // ClientError -> WorkflowError -> ServerError
        let client_err = ClientError::HttpStatus { status: 502, body: "bad gateway".into() };
        let server_err: ServerError = WorkflowError::from(client_err).into();
        assert!(server_err.to_string().contains("502"));
    }

    #[test]
    fn test_missing_email_column_format() {
        let err = InputError::MissingEmailColumn {
            expected: "Work Email, Email".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Work Email"));
        assert!(msg.contains("No email column"));
    }
}
