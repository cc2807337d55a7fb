use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::bridge::DEFAULT_START_ROW;
use crate::format::LocaleFormat;
use crate::view::DEFAULT_PAGE_SIZE;

#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot expand path {0:?}: {1}")]
    PathExpansion(String, String),
    #[error("unknown locale {0:?}, expected ru-RU or en-US")]
    UnknownLocale(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("unsupported file type: {0}")]
    UnknownFileType(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    ToggleSort,
    SortAscending,
    SortDescending,
    Search,
    ClearSearch,
    Import,
    Export,
    Enter,
    Exit,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

/// What the command line is collecting input for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Search,
    Import,
    Export,
}

impl CMDMode {
    pub fn prompt(self) -> &'static str {
        match self {
            CMDMode::Search => "/",
            CMDMode::Import => "import: ",
            CMDMode::Export => "export as: ",
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct GridConfig {
    pub event_poll_time: u64,
    pub page_size: i64,
    pub locale: LocaleFormat,
    pub export_dir: PathBuf,
    pub sheet_name: Option<String>,
    pub start_row: usize,
    pub log_file: PathBuf,
    /// Row numbers left of the table.
    pub show_index: bool,
    /// Columns rendered as money in the locale's currency.
    pub currency_columns: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            page_size: DEFAULT_PAGE_SIZE,
            locale: LocaleFormat::default(),
            export_dir: PathBuf::from("."),
            sheet_name: None,
            start_row: DEFAULT_START_ROW,
            log_file: PathBuf::from("brokergrid.log"),
            show_index: true,
            currency_columns: Vec::new(),
        }
    }
}

/// Expands `~` and `$VAR` in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, GridError> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| GridError::PathExpansion(raw.to_string(), e.to_string()))
}

pub const HELP_TEXT: &str = "\
brokergrid

  q            quit
  h j k l      move cursor (arrow keys work too)
  n / p        next / previous page
  g / G        first / last page
  s            cycle sort on current column (asc, desc, off)
  < / >        sort current column ascending / descending
  /            search all columns
  c            clear search
  i            import xlsx file
  e            export filtered rows to xlsx
  Enter        show current record
  Esc          close popup / banner
  ?            this help
";
