//! Artifacts for the generated cases
//!
//! The model answers with a Markdown table; export extracts the
//! pipe-delimited rows, dedups them and renders the Markdown document and
//! the Excel workbook.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;

use crate::error::{CasegenError, Result};

static TABLE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|.+\|").expect("table row pattern compiles"));

/// Run of dashes marking a Markdown separator row
const SEPARATOR_MARK: &str = "--------";

/// Pull the pipe-delimited table rows out of the raw model output,
/// dropping duplicates while preserving first-seen order.
pub fn extract_table_rows(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for found in TABLE_ROW.find_iter(raw) {
        let row = found.as_str().to_string();
        if seen.insert(row.clone()) {
            rows.push(row);
        }
    }

    rows
}

/// Assemble the Markdown document from the extracted rows.
pub fn to_markdown(rows: &[String]) -> String {
    rows.join("\n")
}

/// Lay the rows out as (row, column, text) grid cells.
///
/// Separator rows are dropped and the rows after them shift up one, so
/// the data follows the header directly. The empty cell before each
/// row's leading `|` is never emitted.
fn grid_cells(rows: &[String]) -> Vec<(u32, u16, String)> {
    let mut cells = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        if row.contains(SEPARATOR_MARK) {
            continue;
        }

        let target_row = if row_index > 1 { row_index - 1 } else { row_index };
        for (col_index, cell) in row.split('|').enumerate() {
            if col_index == 0 {
                continue;
            }
            cells.push((target_row as u32, (col_index - 1) as u16, cell.trim().to_string()));
        }
    }

    cells
}

/// Write the rows into an Excel workbook at `path`.
pub fn write_xlsx(rows: &[String], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (row, col, text) in grid_cells(rows) {
        worksheet
            .write_string(row, col, text.as_str())
            .map_err(|e| CasegenError::Export {
                reason: format!("failed to write cell: {}", e),
            })?;
    }

    workbook.save(path).map_err(|e| CasegenError::Export {
        reason: format!("failed to save workbook: {}", e),
    })?;

    Ok(())
}
