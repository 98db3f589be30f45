//! Interpretation of the validation service result file.
//!
//! The result CSV is loosely typed; each row is read into a
//! [`ValidationRecord`] with optional fields, and [`derive_label`] classifies
//! it. A record is `Valid` only when every required field is present and has
//! the expected value:
//!
//! | Column            | Required value |
//! |-------------------|----------------|
//! | `Recent Abuse`    | `false`        |
//! | `Valid`           | `true`         |
//! | `Disposable`      | `false`        |
//! | `Honeypot`        | `false`        |
//! | `Spam Trap Score` | `none`         |
//!
//! Anything else, including a missing column or an unreadable value, is
//! `Invalid`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ClientError, ClientResult};
use crate::models::{ContactRow, ContactTable, Label, LABEL_COLUMN};
use crate::parser::{decode_content, detect_encoding};
use crate::transform::dedup::email_value;

pub const COL_DATE: &str = "Date";
pub const COL_EMAIL: &str = "Email Address";
pub const COL_RECENT_ABUSE: &str = "Recent Abuse";
pub const COL_VALID: &str = "Valid";
pub const COL_DISPOSABLE: &str = "Disposable";
pub const COL_HONEYPOT: &str = "Honeypot";
pub const COL_SPAM_TRAP: &str = "Spam Trap Score";

/// Columns of the raw result excerpt offered for download.
pub const EXCERPT_COLUMNS: [&str; 8] = [
    COL_DATE,
    COL_EMAIL,
    COL_RECENT_ABUSE,
    COL_VALID,
    COL_DISPOSABLE,
    COL_HONEYPOT,
    COL_SPAM_TRAP,
    LABEL_COLUMN,
];

/// One row of the result file, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub email: String,
    pub date: Option<String>,
    pub recent_abuse: Option<bool>,
    pub valid: Option<bool>,
    pub disposable: Option<bool>,
    pub honeypot: Option<bool>,
    pub spam_trap_score: Option<String>,
    pub label: Label,
}

impl ValidationRecord {
    /// Build a record and derive its label.
    pub fn new(
        email: impl Into<String>,
        recent_abuse: Option<bool>,
        valid: Option<bool>,
        disposable: Option<bool>,
        honeypot: Option<bool>,
        spam_trap_score: Option<String>,
    ) -> Self {
        let mut record = Self {
            email: email.into(),
            date: None,
            recent_abuse,
            valid,
            disposable,
            honeypot,
            spam_trap_score,
            label: Label::Invalid,
        };
        record.label = derive_label(&record);
        record
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Classify a record. Fails closed: any absent field yields `Invalid`.
pub fn derive_label(record: &ValidationRecord) -> Label {
    match (
        record.recent_abuse,
        record.valid,
        record.disposable,
        record.honeypot,
        record.spam_trap_score.as_deref(),
    ) {
        (Some(false), Some(true), Some(false), Some(false), Some("none")) => Label::Valid,
        _ => Label::Invalid,
    }
}

/// Read a boolean cell. Accepts `true`/`false` in any case and `1`/`0`.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse the downloaded result file.
///
/// Rows without an email are skipped. The `Email Address` column is required.
pub fn parse_results(bytes: &[u8]) -> ClientResult<Vec<ValidationRecord>> {
    let content = decode_content(bytes, &detect_encoding(bytes));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ClientError::InvalidResultFile(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let email_col = position(COL_EMAIL).ok_or_else(|| {
        ClientError::InvalidResultFile(format!("missing '{}' column", COL_EMAIL))
    })?;
    let date_col = position(COL_DATE);
    let abuse_col = position(COL_RECENT_ABUSE);
    let valid_col = position(COL_VALID);
    let disposable_col = position(COL_DISPOSABLE);
    let honeypot_col = position(COL_HONEYPOT);
    let spam_col = position(COL_SPAM_TRAP);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ClientError::InvalidResultFile(e.to_string()))?;
        let cell = |col: Option<usize>| col.and_then(|i| row.get(i)).unwrap_or("");

        let Some(email) = email_value(cell(Some(email_col))) else {
            continue;
        };

        let mut record = ValidationRecord::new(
            email,
            parse_flag(cell(abuse_col)),
            parse_flag(cell(valid_col)),
            parse_flag(cell(disposable_col)),
            parse_flag(cell(honeypot_col)),
            non_empty(cell(spam_col)),
        );
        record.date = non_empty(cell(date_col));
        records.push(record);
    }

    Ok(records)
}

/// Email → label lookup. A later record for the same email wins.
pub fn label_index(records: &[ValidationRecord]) -> HashMap<String, Label> {
    records
        .iter()
        .map(|r| (r.email.clone(), r.label))
        .collect()
}

/// Raw result excerpt as a table, in [`EXCERPT_COLUMNS`] order.
pub fn excerpt_table(records: &[ValidationRecord]) -> ContactTable {
    fn flag(v: Option<bool>) -> String {
        v.map(|b| b.to_string()).unwrap_or_default()
    }

    let headers = EXCERPT_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows = records
        .iter()
        .map(|r| {
            ContactRow::new(vec![
                r.date.clone().unwrap_or_default(),
                r.email.clone(),
                flag(r.recent_abuse),
                flag(r.valid),
                flag(r.disposable),
                flag(r.honeypot),
                r.spam_trap_score.clone().unwrap_or_default(),
                r.label.to_string(),
            ])
        })
        .collect();
    ContactTable::new(headers, rows)
}
