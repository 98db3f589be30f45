//! Attach derived labels to the original (non-deduplicated) table.
//!
//! Rows are matched on their trimmed email, so every row sharing a duplicated
//! email receives the same label. Rows whose email is not in the result set
//! keep whatever the label cell already held (empty on first merge), which
//! makes merging idempotent.

use std::collections::HashMap;

use crate::models::{ContactTable, Label, LABEL_COLUMN};
use super::dedup::email_value;

/// Copy of `table` with an [`LABEL_COLUMN`] column filled from `labels`.
pub fn merge_labels(
    table: &ContactTable,
    email_column: &str,
    labels: &HashMap<String, Label>,
) -> ContactTable {
    let mut merged = table.clone();
    let Some(email_col) = merged.column_index(email_column) else {
        return merged;
    };
    let label_col = merged.ensure_column(LABEL_COLUMN);

    for row in &mut merged.rows {
        let label = email_value(row.get(email_col)).and_then(|email| labels.get(email));
        match label {
            Some(label) => row.set(label_col, label.as_str()),
            None => {
                if row.cells.len() <= label_col {
                    row.set(label_col, "");
                }
            }
        }
    }

    merged
}

/// Number of rows that received a label.
pub fn labelled_count(table: &ContactTable) -> usize {
    table
        .column_values(LABEL_COLUMN)
        .into_iter()
        .filter(|v| !v.is_empty())
        .count()
}
