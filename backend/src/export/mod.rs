//! Downloadable outputs of a validation run.
//!
//! Two spreadsheets can come out of a finished run:
//!
//! | Output            | File name                                  |
//! |-------------------|--------------------------------------------|
//! | raw result excerpt| `[IPQS] [YYYYMMDD_Cleansed]_{batch}.xlsx`  |
//! | annotated upload  | `[YYYYMMDD_IPQS] {batch}.xlsx`             |
//!
//! where `{batch}` is `{ACCOUNT}_{upload stem}`.

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::error::ExportResult;
use crate::models::ContactTable;
use crate::validation::excerpt_table;
use crate::workflow::ValidationSession;

/// A file ready to hand to the operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Output file flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Upload name without its extension.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Batch name submitted to the service: `{ACCOUNT}_{stem}`.
pub fn batch_name(account: &str, file_name: &str) -> String {
    format!("{}_{}", account.trim().to_uppercase(), file_stem(file_name))
}

/// `[IPQS] [20240501_Cleansed]_ACME_leads.xlsx`
pub fn raw_export_name(batch: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "[IPQS] {}_{}.{}",
        date.format("[%Y%m%d_Cleansed]"),
        batch,
        format.extension()
    )
}

/// `[20240501_IPQS] ACME_leads.xlsx`
pub fn annotated_export_name(batch: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!("{} {}.{}", date.format("[%Y%m%d_IPQS]"), batch, format.extension())
}

/// Write a table as a single-sheet workbook with a bold header row.
pub fn write_xlsx(table: &ContactTable) -> ExportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for col in 0..table.headers.len() {
            let value = row.get(col);
            if !value.is_empty() {
                sheet.write_string(r as u32 + 1, col as u16, value)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write a table as comma-separated text.
pub fn write_csv(table: &ContactTable) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record((0..table.headers.len()).map(|i| row.get(i)))?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn write(table: &ContactTable, format: ExportFormat) -> ExportResult<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => write_xlsx(table),
        ExportFormat::Csv => write_csv(table),
    }
}

/// Downloads available for a session: the raw excerpt once results are
/// fetched, the annotated upload once labels are merged.
pub fn session_downloads(
    session: &ValidationSession,
    date: NaiveDate,
    format: ExportFormat,
) -> ExportResult<Vec<Download>> {
    let mut downloads = Vec::new();

    if let Some(records) = &session.records {
        downloads.push(Download {
            file_name: raw_export_name(&session.batch_name, date, format),
            bytes: write(&excerpt_table(records), format)?,
        });
    }
    if let Some(annotated) = &session.annotated {
        downloads.push(Download {
            file_name: annotated_export_name(&session.batch_name, date, format),
            bytes: write(annotated, format)?,
        });
    }

    Ok(downloads)
}
