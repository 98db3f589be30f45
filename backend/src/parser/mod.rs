//! Contact file loader.
//!
//! Turns an uploaded `.csv` or `.xlsx` file into a [`ContactTable`] and finds
//! the email column. Delimited text goes through encoding and delimiter
//! auto-detection; spreadsheets are read with [`spreadsheet`].
//!
//! ```ignore
//! use ipqs_validation::parser::load;
//!
//! let loaded = load("leads.csv", b"Name,Work Email\nAnn,ann@x.com\n")?;
//! assert_eq!(loaded.email_column.as_deref(), Some("Work Email"));
//! assert_eq!(loaded.table.len(), 1);
//! ```

pub mod spreadsheet;

use serde::Serialize;
use std::path::Path;

use crate::api::logs::log_warning;
use crate::error::{InputError, InputResult};
use crate::models::{ContactRow, ContactTable};

/// Header names accepted as the email column, in priority order.
pub const EMAIL_COLUMN_CANDIDATES: [&str; 3] = ["Work Email", "Email", "Email Address"];

/// Kind of file the table was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Delimited,
    Spreadsheet,
}

/// A loaded table with parsing metadata.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub table: ContactTable,
    /// Resolved email column, if any candidate header was found
    pub email_column: Option<String>,
    pub format: SourceFormat,
    /// Detected encoding (delimited text only)
    pub encoding: Option<String>,
    /// Detected delimiter (delimited text only)
    pub delimiter: Option<char>,
    /// Leading rows skipped before the header (spreadsheets only)
    pub header_offset: usize,
}

impl LoadedTable {
    /// The email column, or [`InputError::MissingEmailColumn`].
    pub fn require_email_column(&self) -> InputResult<&str> {
        self.email_column
            .as_deref()
            .ok_or_else(|| InputError::MissingEmailColumn {
                expected: EMAIL_COLUMN_CANDIDATES.join(", "),
            })
    }
}

/// First candidate header present in `headers`.
pub fn resolve_email_column(headers: &[String]) -> Option<String> {
    EMAIL_COLUMN_CANDIDATES
        .iter()
        .find(|candidate| headers.iter().any(|h| h == *candidate))
        .map(|c| c.to_string())
}

/// Load a contact file from disk.
pub fn load_file<P: AsRef<Path>>(path: P) -> InputResult<LoadedTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    load(name, &bytes)
}

/// Logged when an upload has none of the recognised email headers.
pub const MISSING_EMAIL_WARNING: &str =
    "Please check that the uploaded file is correct. The file must have an email column to proceed.";

/// Load a contact file from raw bytes. The format is chosen by extension.
///
/// A table without an email column still loads, with a warning logged.
pub fn load(file_name: &str, bytes: &[u8]) -> InputResult<LoadedTable> {
    let loaded = load_by_extension(file_name, bytes)?;
    if loaded.email_column.is_none() {
        log_warning(MISSING_EMAIL_WARNING);
    }
    Ok(loaded)
}

fn load_by_extension(file_name: &str, bytes: &[u8]) -> InputResult<LoadedTable> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" | "tsv" => parse_delimited(bytes),
        "xlsx" | "xlsm" | "xls" => spreadsheet::parse_spreadsheet(bytes),
        other => Err(InputError::UnsupportedFormat(if other.is_empty() {
            file_name.to_string()
        } else {
            format!(".{}", other)
        })),
    }
}

// =============================================================================
// Delimited text
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding. A UTF-8 BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited bytes with encoding and delimiter auto-detection.
pub fn parse_delimited(bytes: &[u8]) -> InputResult<LoadedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_delimited_str(&content, delimiter)?;
    let email_column = resolve_email_column(&table.headers);

    Ok(LoadedTable {
        table,
        email_column,
        format: SourceFormat::Delimited,
        encoding: Some(encoding),
        delimiter: Some(delimiter),
        header_offset: 0,
    })
}

/// Parse delimited text with an explicit delimiter.
///
/// Headers are trimmed, short rows are padded, blank rows dropped.
pub fn parse_delimited_str(content: &str, delimiter: char) -> InputResult<ContactTable> {
    if content.trim().is_empty() {
        return Err(InputError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InputError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::EmptyFile);
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| InputError::Csv(format!("line {}: {}", idx + 2, e)))?;
        let mut cells: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        cells.resize(headers.len().max(cells.len()), String::new());
        let row = ContactRow::new(cells);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(ContactTable::new(headers, rows))
}
