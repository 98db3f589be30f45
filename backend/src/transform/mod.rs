//! Row-level transformations of the contact table.
//!
//! - [`dedup`] - duplicate detection and first-occurrence deduplication
//! - [`merge`] - attaching derived labels back to the original rows

pub mod dedup;
pub mod merge;

pub use dedup::{dedupe, duplicate_report, find_duplicates, DuplicateReport, DuplicateRow};
pub use merge::merge_labels;
