//! Duplicate detection and first-occurrence deduplication of email values.
//!
//! Emails are compared after trimming surrounding whitespace and are
//! case-sensitive: `a@x.com` and `A@x.com` are different values. Empty values
//! are never duplicates of each other and are never submitted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{ContactRow, ContactTable};

/// Trimmed email value, or `None` when the cell is blank.
pub fn email_value(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// A row flagged as carrying a duplicated email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRow {
    /// 1-based row position in the uploaded table
    pub index: usize,
    pub email: String,
}

/// Duplicated emails and the rows carrying them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub duplicates: BTreeSet<String>,
    pub rows: Vec<DuplicateRow>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty()
    }
}

/// Emails appearing at least twice in `email_column`.
pub fn find_duplicates(table: &ContactTable, email_column: &str) -> BTreeSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for raw in table.column_values(email_column) {
        if let Some(email) = email_value(raw) {
            *counts.entry(email).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, n)| *n >= 2)
        .map(|(email, _)| email.to_string())
        .collect()
}

/// Duplicate set plus every flagged row, in table order.
pub fn duplicate_report(table: &ContactTable, email_column: &str) -> DuplicateReport {
    let duplicates = find_duplicates(table, email_column);

    let rows = table
        .column_values(email_column)
        .into_iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let email = email_value(raw)?;
            duplicates.contains(email).then(|| DuplicateRow {
                index: i + 1,
                email: email.to_string(),
            })
        })
        .collect();

    DuplicateReport { duplicates, rows }
}

/// Rows to submit: blank emails dropped, email cell trimmed, first row per
/// email kept, original order preserved.
pub fn dedupe(table: &ContactTable, email_column: &str) -> ContactTable {
    let Some(col) = table.column_index(email_column) else {
        return ContactTable::new(table.headers.clone(), Vec::new());
    };

    let mut seen: HashSet<String> = HashSet::new();
    let rows: Vec<ContactRow> = table
        .rows
        .iter()
        .filter_map(|row| {
            let email = email_value(row.get(col))?.to_string();
            if !seen.insert(email.clone()) {
                return None;
            }
            let mut kept = row.clone();
            kept.set(col, email);
            Some(kept)
        })
        .collect();

    ContactTable::new(table.headers.clone(), rows)
}

/// Submission payload: one single-element row per email.
pub fn submission_rows(batch: &ContactTable, email_column: &str) -> Vec<Vec<String>> {
    batch
        .column_values(email_column)
        .into_iter()
        .map(|email| vec![email.to_string()])
        .collect()
}
