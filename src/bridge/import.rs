use std::any::Any;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use calamine::{Data, ExcelDateTime, Reader, open_workbook_auto_from_rs};
use tracing::{debug, error, info, warn};

use super::{ImportConfig, ImportResult};
use crate::value::{Record, Value};

/// Reads and parses a spreadsheet file. Always resolves; failures are returned as data.
pub async fn import_file<T>(path: impl AsRef<Path>, config: &ImportConfig<T>) -> ImportResult<T> {
    let path = path.as_ref();
    info!("Importing {} ...", path.display());
    match tokio::fs::read(path).await {
        Ok(bytes) => import_bytes(bytes, config),
        Err(e) => {
            warn!("Reading {} failed: {e}", path.display());
            ImportResult::failed(format!("Failed to read {}: {e}", path.display()))
        }
    }
}

// Largest serial Excel can display, 9999-12-31.
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Parses an in-memory workbook into records of `T`.
///
/// A panic in the parser or in the caller's validator or transform is
/// contained and reported like any other import failure.
pub fn import_bytes<T>(bytes: Vec<u8>, config: &ImportConfig<T>) -> ImportResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| parse_bytes(bytes, config))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(&*payload);
            error!("Import panicked: {reason}");
            ImportResult::failed(format!("Import aborted: {reason}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn parse_bytes<T>(bytes: Vec<u8>, config: &ImportConfig<T>) -> ImportResult<T> {
    let start_time = Instant::now();

    let rows = match read_sheet_rows(bytes, config.sheet_name.as_deref()) {
        Ok(rows) => rows,
        Err(message) => {
            warn!("Import failed: {message}");
            return ImportResult::failed(message);
        }
    };
    let raw = zip_with_headers(&rows, config.start_row);
    debug!(
        "Parsed {} rows into {} records in {}ms",
        rows.len(),
        raw.len(),
        start_time.elapsed().as_millis()
    );

    if let Some(validate) = &config.validate {
        let errors = validate(&raw);
        if !errors.is_empty() {
            warn!("Validation rejected import with {} errors", errors.len());
            return ImportResult::Rejected { raw, errors };
        }
    }

    match (config.transform)(raw) {
        Ok(data) => {
            info!("Imported {} records", data.len());
            ImportResult::Imported(data)
        }
        Err(message) => {
            warn!("Transform failed: {message}");
            ImportResult::failed(message)
        }
    }
}

fn read_sheet_rows(bytes: Vec<u8>, sheet_name: Option<&str>) -> Result<Vec<Vec<Value>>, String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| format!("Failed to open workbook: {e}"))?;

    let names = workbook.sheet_names();
    let name = match sheet_name {
        Some(wanted) if names.iter().any(|n| n == wanted) => wanted.to_string(),
        Some(wanted) => return Err(format!("Sheet \"{wanted}\" not found")),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| "Workbook contains no sheets".to_string())?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| format!("Failed to read sheet \"{name}\": {e}"))?;
    debug!("Sheet \"{name}\": {}x{}", range.height(), range.width());

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

fn cell_value(data: &Data) -> Value {
    match data {
        Data::Empty => Value::Text(String::new()),
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => date_value(dt),
        Data::DateTimeIso(s) => Value::Text(s.clone()),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(e.to_string()),
    }
}

// Durations stay numbers of days. Dates honour the workbook's 1900 or 1904 epoch.
fn date_value(dt: &ExcelDateTime) -> Value {
    let serial = dt.as_f64();
    if dt.is_duration() || !serial.is_finite() || serial.abs() > MAX_DATE_SERIAL {
        return Value::Number(serial);
    }
    dt.as_datetime()
        .map(Value::Date)
        .unwrap_or(Value::Number(serial))
}

// Row 0 names the fields. `start_row` counts the header too, so 0 keeps it as a record.
fn zip_with_headers(rows: &[Vec<Value>], start_row: usize) -> Vec<Record> {
    let Some(header_row) = rows.first() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.iter().map(|v| v.to_string()).collect();

    rows.iter()
        .skip(start_row)
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(idx, header)| {
                    let value = row
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| Value::Text(String::new()));
                    (header.clone(), value)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;
    use chrono::NaiveDate;

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn zips_rows_by_position() {
        let rows = vec![
            vec![text("id"), text("name")],
            vec![Value::Number(1.0), text("Альфа")],
            vec![Value::Number(2.0)],
        ];
        let records = zip_with_headers(&rows, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value("name"), text("Альфа"));
        assert_eq!(records[1].value("name"), text(""));
    }

    #[test]
    fn start_row_counts_header() {
        let rows = vec![
            vec![text("id")],
            vec![Value::Number(1.0)],
            vec![Value::Number(2.0)],
        ];
        assert_eq!(zip_with_headers(&rows, 0)[0].value("id"), text("id"));
        assert_eq!(zip_with_headers(&rows, 2).len(), 1);
        assert!(zip_with_headers(&rows, 10).is_empty());
        assert!(zip_with_headers(&[], 1).is_empty());
    }

    #[test]
    fn garbage_bytes_are_rejected_not_raised() {
        let result = import_bytes(vec![0x01, 0x02, 0x03], &ImportConfig::new());
        assert_eq!(result.errors().len(), 1);
        match result {
            ImportResult::Rejected { raw, .. } => assert!(raw.is_empty()),
            ImportResult::Imported(_) => panic!("garbage must not import"),
        }
    }

    #[test]
    fn cell_conversion() {
        assert_eq!(cell_value(&Data::Empty), text(""));
        assert_eq!(cell_value(&Data::Int(7)), Value::Number(7.0));
        assert_eq!(cell_value(&Data::Bool(false)), Value::Bool(false));
        assert_eq!(cell_value(&Data::String("x".into())), text("x"));
    }

    fn excel_date(serial: f64, kind: ExcelDateTimeType, is_1904: bool) -> Data {
        Data::DateTime(ExcelDateTime::new(serial, kind, is_1904))
    }

    #[test]
    fn dates_follow_workbook_epoch() {
        let day = |y, m, d| {
            Value::Date(
                NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
        };
        assert_eq!(
            cell_value(&excel_date(44986.0, ExcelDateTimeType::DateTime, false)),
            day(2023, 3, 1)
        );
        assert_eq!(
            cell_value(&excel_date(44986.0, ExcelDateTimeType::DateTime, true)),
            day(2027, 3, 2)
        );
    }

    #[test]
    fn durations_and_out_of_range_serials_stay_numbers() {
        assert_eq!(
            cell_value(&excel_date(1.5, ExcelDateTimeType::TimeDelta, false)),
            Value::Number(1.5)
        );
        assert_eq!(
            cell_value(&excel_date(1e12, ExcelDateTimeType::DateTime, false)),
            Value::Number(1e12)
        );
    }

    #[test]
    fn panicking_transform_becomes_rejection() {
        let bytes = crate::bridge::export_bytes(
            &[Record::new().with("id", 1)],
            &crate::bridge::ExportSpec::new("x"),
        )
        .unwrap();
        let config = ImportConfig::new().transform_data(|_rows| -> Result<Vec<Record>, String> {
            panic!("broken mapper")
        });
        let result = import_bytes(bytes, &config);
        assert!(!result.is_imported());
        assert_eq!(
            result.error_message().as_deref(),
            Some("Import aborted: broken mapper")
        );
    }
}
