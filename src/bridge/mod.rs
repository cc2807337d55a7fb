//! Moves record lists in and out of spreadsheet files.
//!
//! Import never fails: every problem comes back as [`ImportResult::Rejected`].
//! Export returns a `Result` and the caller has to deal with the error.

mod export;
mod import;

pub use export::{export_bytes, export_file};
pub use import::{import_bytes, import_file};

use std::fmt;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::value::Record;

pub const DEFAULT_SHEET_NAME: &str = "Data";
pub const DEFAULT_START_ROW: usize = 1;
const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid sheet name {name:?}: {reason}")]
    InvalidSheetName { name: String, reason: &'static str },
    #[error("export file name must not be empty")]
    EmptyFileName,
    #[error("invalid export file name {name:?}: {reason}")]
    InvalidFileName { name: String, reason: &'static str },
    #[error("failed to serialize workbook: {0}")]
    Serialize(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Validator = Box<dyn Fn(&[Record]) -> Vec<String> + Send + Sync>;
pub type Transform<T> = Box<dyn Fn(Vec<Record>) -> Result<Vec<T>, String> + Send + Sync>;
pub type Shape<T> = Box<dyn Fn(&T) -> Record + Send + Sync>;

/// How a sheet becomes a list of `T`.
pub struct ImportConfig<T = Record> {
    pub sheet_name: Option<String>,
    /// Leading rows to skip, counted including the header row.
    pub start_row: usize,
    validate: Option<Validator>,
    transform: Transform<T>,
}

impl Default for ImportConfig<Record> {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportConfig<Record> {
    pub fn new() -> Self {
        Self {
            sheet_name: None,
            start_row: DEFAULT_START_ROW,
            validate: None,
            transform: Box::new(|rows: Vec<Record>| Ok(rows)),
        }
    }
}

impl<T> ImportConfig<T> {
    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    pub fn start_row(mut self, start_row: usize) -> Self {
        self.start_row = start_row;
        self
    }

    /// Checks the raw rows. Any returned message rejects the whole import.
    pub fn validate_data(
        mut self,
        validate: impl Fn(&[Record]) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Maps validated raw rows into the caller's type.
    pub fn transform_data<U>(
        self,
        transform: impl Fn(Vec<Record>) -> Result<Vec<U>, String> + Send + Sync + 'static,
    ) -> ImportConfig<U> {
        ImportConfig {
            sheet_name: self.sheet_name,
            start_row: self.start_row,
            validate: self.validate,
            transform: Box::new(transform),
        }
    }
}

impl<T> fmt::Debug for ImportConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportConfig")
            .field("sheet_name", &self.sheet_name)
            .field("start_row", &self.start_row)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Outcome of one import attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportResult<T> {
    Imported(Vec<T>),
    /// `raw` holds the parsed rows when validation failed, and is empty otherwise.
    Rejected { raw: Vec<Record>, errors: Vec<String> },
}

impl<T> ImportResult<T> {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        ImportResult::Rejected {
            raw: Vec::new(),
            errors: vec![message.into()],
        }
    }

    pub fn is_imported(&self) -> bool {
        matches!(self, ImportResult::Imported(_))
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ImportResult::Imported(_) => &[],
            ImportResult::Rejected { errors, .. } => errors,
        }
    }

    /// All errors joined for a single banner line.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ImportResult::Imported(_) => None,
            ImportResult::Rejected { errors, .. } => Some(errors.join("; ")),
        }
    }

    pub fn into_data(self) -> Option<Vec<T>> {
        match self {
            ImportResult::Imported(data) => Some(data),
            ImportResult::Rejected { .. } => None,
        }
    }
}

/// Naming and row shaping of one export.
pub struct ExportSpec<T = Record> {
    pub file_name: String,
    pub sheet_name: String,
    shape: Shape<T>,
}

impl ExportSpec<Record> {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self::shaped(file_name, Record::clone)
    }
}

impl<T> ExportSpec<T> {
    pub fn shaped(
        file_name: impl Into<String>,
        shape: impl Fn(&T) -> Record + Send + Sync + 'static,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            shape: Box::new(shape),
        }
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }
}

impl<T> fmt::Debug for ExportSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportSpec")
            .field("file_name", &self.file_name)
            .field("sheet_name", &self.sheet_name)
            .finish()
    }
}

// The name is joined onto the export directory, so it has to stay a single path component.
fn validate_file_name(name: &str) -> Result<(), BridgeError> {
    let invalid = |reason: &'static str| -> Result<(), BridgeError> {
        Err(BridgeError::InvalidFileName {
            name: name.to_string(),
            reason,
        })
    };
    if name.trim().is_empty() {
        Err(BridgeError::EmptyFileName)
    } else if name.contains(['/', '\\']) {
        invalid("contains a path separator")
    } else if name.contains('\0') {
        invalid("contains a NUL character")
    } else if name == "." || name == ".." {
        invalid("is a relative directory")
    } else {
        Ok(())
    }
}

fn validate_sheet_name(name: &str) -> Result<(), BridgeError> {
    let reason = if name.trim().is_empty() {
        Some("must not be empty")
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        Some("longer than 31 characters")
    } else if name.contains(FORBIDDEN_SHEET_CHARS) {
        Some("contains one of [ ] : * ? / \\")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(BridgeError::InvalidSheetName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

// Serial dates count days from 1899-12-30, which absorbs the 1900 leap year bug.
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub(crate) fn datetime_to_serial(date: NaiveDateTime) -> f64 {
    (date - excel_epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn serial_dates() {
        let d = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(datetime_to_serial(d), 44986.0);

        let noon = d + TimeDelta::hours(12);
        assert_eq!(datetime_to_serial(noon), 44986.5);
    }

    #[test]
    fn sheet_names() {
        assert!(validate_sheet_name("Брокеры").is_ok());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
    }

    #[test]
    fn file_names_stay_inside_export_dir() {
        assert!(validate_file_name("брокеры 2024").is_ok());
        assert!(matches!(validate_file_name(" "), Err(BridgeError::EmptyFileName)));
        for name in ["../x", "a/b", "a\\b", "..", "."] {
            assert!(
                matches!(validate_file_name(name), Err(BridgeError::InvalidFileName { .. })),
                "{name} accepted"
            );
        }
    }

    #[test]
    fn result_accessors() {
        let ok: ImportResult<Record> = ImportResult::Imported(vec![Record::new()]);
        assert!(ok.is_imported());
        assert!(ok.errors().is_empty());
        assert_eq!(ok.error_message(), None);

        let rejected: ImportResult<Record> = ImportResult::Rejected {
            raw: Vec::new(),
            errors: vec!["row 2: name is required".into(), "row 3: bad INN".into()],
        };
        assert_eq!(
            rejected.error_message().as_deref(),
            Some("row 2: name is required; row 3: bad INN")
        );
        assert_eq!(rejected.into_data(), None);
    }
}
