//! Domain models for the validation workflow.
//!
//! - [`ContactTable`] / [`ContactRow`] - the uploaded contact list, in file order
//! - [`JobStatus`] - lifecycle of a batch job on the validation service
//! - [`Label`] - the locally derived `Valid` / `Invalid` classification

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Header of the derived label column added to exports.
pub const LABEL_COLUMN: &str = "IPQS Validation";

// =============================================================================
// Contact table
// =============================================================================

/// One row of the uploaded file. Cells are aligned with [`ContactTable::headers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRow {
    pub cells: Vec<String>,
}

impl ContactRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// Cell at `index`, or `""` when the row is shorter than the header.
    pub fn get(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// Overwrite the cell at `index`, padding the row if needed.
    pub fn set(&mut self, index: usize, value: impl Into<String>) {
        if self.cells.len() <= index {
            self.cells.resize(index + 1, String::new());
        }
        self.cells[index] = value.into();
    }

    /// True when every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Ordered table of contact rows. Row order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactTable {
    pub headers: Vec<String>,
    pub rows: Vec<ContactRow>,
}

impl ContactTable {
    pub fn new(headers: Vec<String>, rows: Vec<ContactRow>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a header, exact match.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of `name`, appending an empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(i) => i,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        }
    }

    /// All values of a column, in row order. Missing cells read as `""`.
    pub fn column_values<'a>(&'a self, name: &str) -> Vec<&'a str> {
        match self.column_index(name) {
            Some(i) => self.rows.iter().map(|r| r.get(i)).collect(),
            None => Vec::new(),
        }
    }

    /// Rows as JSON objects keyed by header (for the HTTP API).
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (i, header) in self.headers.iter().enumerate() {
                    obj.insert(header.clone(), Value::String(row.get(i).to_string()));
                }
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Job status
// =============================================================================

/// Status of a batch job as reported by the validation service.
///
/// Only [`JobStatus::Finished`] and [`JobStatus::Error`] are terminal.
/// Unrecognised strings are kept as [`JobStatus::Unknown`] and keep the poll
/// loop running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    New,
    Processing,
    UniqueResults,
    Finalizing,
    Finished,
    Error,
    Unknown(String),
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "NEW" => JobStatus::New,
            "PROCESSING" => JobStatus::Processing,
            "UNIQUE_RESULTS" => JobStatus::UniqueResults,
            "FINALIZING" => JobStatus::Finalizing,
            "FINISHED" => JobStatus::Finished,
            "ERROR" => JobStatus::Error,
            other => JobStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::New => "NEW",
            JobStatus::Processing => "PROCESSING",
            JobStatus::UniqueResults => "UNIQUE_RESULTS",
            JobStatus::Finalizing => "FINALIZING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Error => "ERROR",
            JobStatus::Unknown(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }

    /// Operator message and progress percentage for this status.
    pub fn progress(&self) -> (&'static str, u8) {
        match self {
            JobStatus::New => ("CSV is waiting to begin processing.", 0),
            JobStatus::Processing => ("CSV is currently processing through records.", 50),
            JobStatus::UniqueResults => {
                ("CSV is currently being uniqued to remove duplicate records.", 70)
            }
            JobStatus::Finalizing => {
                ("CSV is currently undergoing final checks before processing completes.", 80)
            }
            JobStatus::Finished => ("CSV processing is finished.", 100),
            JobStatus::Error => {
                ("CSV processing encountered an error. Please check again later.", 0)
            }
            JobStatus::Unknown(_) => ("Unknown status", 0),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::parse(&s)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Derived label
// =============================================================================

/// Local classification of one validated email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Valid,
    Invalid,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Valid => "Valid",
            Label::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
