//! Opens a spreadsheet of the office-XML family and yields raw row records
//! for a selected sheet.
//!
//! It does **not**: interpret cell content, apply a column mapping, or
//! coerce values — it only preserves header names and the reader's own
//! notion of cell type (string, number, date-like, boolean).

use std::fmt;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use notify_schemas::{RawCell, RawRow};

#[derive(Debug, Clone)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone)]
pub enum InputError {
    Unreadable { path: String, message: String },
    MissingSheet { sheet: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Unreadable { path, message } => {
                write!(f, "cannot read workbook {path}: {message}")
            }
            InputError::MissingSheet { sheet } => write!(f, "sheet not found: {sheet}"),
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug, Clone, Default)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Reads every row of `sheet` from the workbook at `path`. An empty sheet
/// (header row only, or no rows at all) yields zero rows with no error.
pub fn read_workbook(path: &Path, sheet: &SheetSelector) -> Result<TabularData, InputError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| InputError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let sheet_name = match sheet {
        SheetSelector::Name(name) => name.clone(),
        SheetSelector::Index(idx) => {
            workbook
                .sheet_names()
                .get(*idx)
                .cloned()
                .ok_or_else(|| InputError::MissingSheet {
                    sheet: format!("index {idx}"),
                })?
        }
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|_| InputError::MissingSheet { sheet: sheet_name.clone() })?;

    if range.is_empty() {
        return Ok(TabularData::default());
    }

    let mut rows_iter = range.rows();
    let header_row = match rows_iter.next() {
        Some(r) => r,
        None => return Ok(TabularData::default()),
    };
    let headers: Vec<String> = header_row.iter().map(cell_as_header).collect();

    let mut rows = Vec::new();
    for row in rows_iter {
        let mut map = RawRow::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            map.insert(header.clone(), convert_cell(cell));
        }
        rows.push(map);
    }

    Ok(TabularData { headers, rows })
}

fn cell_as_header(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Str(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(excel_dt) => match excel_dt.as_datetime() {
            Some(dt) => RawCell::DateTime(dt),
            None => RawCell::Str(cell.to_string()),
        },
        Data::DateTimeIso(s) => RawCell::Str(s.clone()),
        Data::DurationIso(s) => RawCell::Str(s.clone()),
        Data::Error(e) => RawCell::Str(format!("#ERROR:{e:?}")),
    }
}
