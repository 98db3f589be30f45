//! # IPQS Validation - contact list email validation
//!
//! Takes a contact spreadsheet, submits its unique email addresses to the
//! IPQS bulk validation service, and returns the original rows annotated with
//! a `Valid` / `Invalid` label.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │ CSV / XLSX  │───▶│   Parser    │───▶│   Dedupe    │───▶│    IPQS     │───▶│   Merge +   │
//! │   upload    │    │ (auto-enc)  │    │ (1st wins)  │    │ submit/poll │    │   export    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │
//!                                                                 ▼
//!                                                          ┌─────────────┐
//!                                                          │  Audit log  │
//!                                                          └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ipqs_validation::{load_file, run, HttpTimeouts, IpqsClient, MemoryAuditLog, PollPolicy, ValidationSession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let loaded = load_file("leads.csv").unwrap();
//!     let session = ValidationSession::prepare("acme", "leads.csv", &loaded).unwrap();
//!     let client = IpqsClient::new("API_KEY", &HttpTimeouts::default()).unwrap();
//!     let audit = MemoryAuditLog::new();
//!     let session = run(&client, &audit, session, &PollPolicy::default()).await.unwrap();
//!     println!("Run ended {}", session.phase);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Contact table, job status, label
//! - [`parser`] - CSV / XLSX loading with auto-detection
//! - [`transform`] - Deduplication and label merge
//! - [`validation`] - Result records and label derivation
//! - [`client`] - IPQS bulk API client
//! - [`workflow`] - Validation session state machine and batch history
//! - [`audit`] - Audit log sinks
//! - [`export`] - Download files
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation results
pub mod validation;

// Validation service
pub mod client;

// Orchestration
pub mod workflow;

// Audit
pub mod audit;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AuditError,
    ClientError,
    ConfigError,
    ExportError,
    InputError,
    ServerError,
    WorkflowError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ContactRow, ContactTable, JobStatus, Label, LABEL_COLUMN};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    detect_delimiter,
    detect_encoding,
    decode_content,
    load,
    load_file,
    resolve_email_column,
    LoadedTable,
    SourceFormat,
    EMAIL_COLUMN_CANDIDATES,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{dedupe, duplicate_report, find_duplicates, merge_labels, DuplicateReport, DuplicateRow};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{derive_label, parse_results, ValidationRecord};

// =============================================================================
// Re-exports - Client
// =============================================================================

pub use client::{IpqsClient, StatusResponse, SubmitResponse, ValidationApi};

// =============================================================================
// Re-exports - Workflow
// =============================================================================

pub use workflow::{
    fetch_history,
    poll_once,
    run,
    submit,
    HistoryEntry,
    Phase,
    PollPolicy,
    ValidationSession,
};

// =============================================================================
// Re-exports - Audit / Export / Config
// =============================================================================

pub use audit::{AuditEntry, AuditSink, FileAuditLog, MemoryAuditLog, SheetsAuditLog};
pub use config::{AuditTarget, HttpTimeouts, Settings};
pub use export::{session_downloads, Download, ExportFormat};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
