use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};
use umya_spreadsheet::{NumberingFormat, Worksheet};

use super::{BridgeError, ExportSpec, datetime_to_serial, validate_file_name, validate_sheet_name};
use crate::value::{Record, Value};

/// Serializes `records` into an xlsx workbook with one sheet.
///
/// Row 1 holds the union of all record keys in first-seen order; records
/// missing a key leave that cell blank.
pub fn export_bytes<T>(records: &[T], spec: &ExportSpec<T>) -> Result<Vec<u8>, BridgeError> {
    let start_time = Instant::now();
    validate_sheet_name(&spec.sheet_name)?;

    let rows: Vec<Record> = records.iter().map(|r| (spec.shape)(r)).collect();
    let headers = Record::union_keys(&rows);

    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book
        .new_sheet(spec.sheet_name.as_str())
        .map_err(|e| BridgeError::Serialize(e.to_string()))?;

    for (col, header) in headers.iter().enumerate() {
        sheet
            .get_cell_mut((coordinate(col)?, 1))
            .set_value_string(header.as_str());
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let row_no = coordinate(row_idx + 1)?;
        for (col, header) in headers.iter().enumerate() {
            if let Some(value) = row.get(header) {
                write_cell(sheet, (coordinate(col)?, row_no), value);
            }
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buffer)
        .map_err(|e| BridgeError::Serialize(e.to_string()))?;
    let bytes = buffer.into_inner();
    debug!(
        "Serialized {} rows x {} columns ({} bytes) in {}ms",
        rows.len(),
        headers.len(),
        bytes.len(),
        start_time.elapsed().as_millis()
    );
    Ok(bytes)
}

/// Writes `<dir>/<file_name>.xlsx` and returns the path written.
///
/// `file_name` must be a bare name; separators and `..` are rejected.
pub fn export_file<T>(
    records: &[T],
    spec: &ExportSpec<T>,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, BridgeError> {
    validate_file_name(&spec.file_name)?;
    let bytes = export_bytes(records, spec)?;
    let path = dir.as_ref().join(format!("{}.xlsx", spec.file_name));
    std::fs::write(&path, bytes).map_err(|source| BridgeError::Write {
        path: path.clone(),
        source,
    })?;
    info!("Exported {} records to {}", records.len(), path.display());
    Ok(path)
}

// 0-based index to umya's 1-based column/row number.
fn coordinate(idx: usize) -> Result<u32, BridgeError> {
    u32::try_from(idx + 1)
        .map_err(|_| BridgeError::Serialize(format!("sheet index {idx} out of range")))
}

fn write_cell(sheet: &mut Worksheet, at: (u32, u32), value: &Value) {
    match value {
        Value::Null => {}
        Value::Text(s) => {
            sheet.get_cell_mut(at).set_value_string(s.as_str());
        }
        Value::Number(n) if n.is_finite() => {
            sheet.get_cell_mut(at).set_value_number(*n);
        }
        Value::Number(_) | Value::Object(_) => {
            sheet.get_cell_mut(at).set_value_string(value.to_string());
        }
        Value::Bool(b) => {
            sheet.get_cell_mut(at).set_value_bool(*b);
        }
        Value::Date(d) => {
            sheet.get_cell_mut(at).set_value_number(datetime_to_serial(*d));
            sheet
                .get_style_mut(at)
                .get_number_format_mut()
                .set_format_code(NumberingFormat::FORMAT_DATE_XLSX14);
        }
    }
}
