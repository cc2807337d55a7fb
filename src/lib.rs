//! Paged, sortable, searchable record lists with xlsx import and export.
//!
//! [`view`] holds the pure sort/filter/paginate pipeline, [`bridge`] moves
//! records in and out of spreadsheet files, and the remaining modules build
//! the terminal list page on top of both.

pub mod bridge;
pub mod controller;
pub mod domain;
pub mod format;
pub mod inputter;
pub mod logging;
pub mod model;
pub mod ui;
pub mod value;
pub mod view;
