//! Spreadsheet (`.xlsx` / `.xls`) loading.
//!
//! Exported contact lists often carry a title row above the real header, so
//! the first worksheet is read twice: once skipping one leading row and once
//! without. The variant whose header contains a recognised email column wins;
//! the skip-one variant is tried first.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;

use super::{resolve_email_column, LoadedTable, SourceFormat};
use crate::error::{InputError, InputResult};
use crate::models::{ContactRow, ContactTable};

/// Parse the first worksheet of a workbook.
pub fn parse_spreadsheet(bytes: &[u8]) -> InputResult<LoadedTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| InputError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InputError::Spreadsheet("No worksheet found".to_string()))?
        .map_err(|e| InputError::Spreadsheet(e.to_string()))?;

    let grid = range_to_grid(&range);
    parse_grid(grid)
}

/// Pick the header offset and build the table from a grid of cell strings.
pub fn parse_grid(grid: Vec<Vec<String>>) -> InputResult<LoadedTable> {
    if grid.iter().all(|row| row.iter().all(|c| c.trim().is_empty())) {
        return Err(InputError::EmptyFile);
    }

    if grid.len() > 1 {
        let skipped = table_from_grid(&grid, 1);
        if let Some(column) = resolve_email_column(&skipped.headers) {
            return Ok(spreadsheet_result(skipped, Some(column), 1));
        }
    }

    let table = table_from_grid(&grid, 0);
    let email_column = resolve_email_column(&table.headers);
    Ok(spreadsheet_result(table, email_column, 0))
}

fn spreadsheet_result(table: ContactTable, email_column: Option<String>, offset: usize) -> LoadedTable {
    LoadedTable {
        table,
        email_column,
        format: SourceFormat::Spreadsheet,
        encoding: None,
        delimiter: None,
        header_offset: offset,
    }
}

fn table_from_grid(grid: &[Vec<String>], offset: usize) -> ContactTable {
    let Some(header_row) = grid.get(offset) else {
        return ContactTable::default();
    };
    let headers: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();

    let rows = grid[offset + 1..]
        .iter()
        .map(|cells| {
            let mut cells = cells.clone();
            cells.resize(headers.len().max(cells.len()), String::new());
            ContactRow::new(cells)
        })
        .filter(|row| !row.is_blank())
        .collect();

    ContactTable::new(headers, rows)
}

fn range_to_grid(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect()
}

/// Render a cell the way it reads in the sheet. Whole floats lose the `.0`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
