use ratatui::crossterm::event::KeyEvent;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info, trace, warn};

use crate::bridge::{self, DEFAULT_SHEET_NAME, ExportSpec, ImportConfig, ImportResult};
use crate::domain::{CMDMode, GridConfig, GridError, HELP_TEXT, Message, expand_path};
use crate::inputter::{InputResult, Inputter};
use crate::value::Record;
use crate::view::{ColumnDescriptor, LocaleCollation, PageView, SortDirection, ViewState};

const MAX_COLUMN_WIDTH: usize = 40;
const MIN_COLUMN_WIDTH: usize = 4;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub headers: Vec<String>,
    pub widths: Vec<u16>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page: i64,
    /// 0-based position of the first visible row among all matches.
    pub first_row: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub search: String,
    pub record: Vec<(String, String)>,
    pub show_record: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub banner: Option<String>,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            headers: Vec::new(),
            widths: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            page: 1,
            first_row: 0,
            total_pages: 0,
            total_items: 0,
            search: String::new(),
            record: Vec::new(),
            show_record: false,
            show_popup: false,
            popup_message: String::new(),
            banner: None,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: GridConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: Option<PathBuf>,
    records: Vec<Record>,
    columns: Vec<ColumnDescriptor<Record>>,
    view: ViewState,
    collation: LocaleCollation,
    page: PageView<Record>,
    curser_row: usize,
    curser_column: usize,
    ui_width: usize,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    runtime: Runtime,
}

impl Model {
    pub fn init(config: &GridConfig) -> Result<Self, GridError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source: None,
            records: Vec::new(),
            columns: Vec::new(),
            view: ViewState::new(config.page_size),
            collation: LocaleCollation::for_format(&config.locale),
            page: PageView {
                rows: Vec::new(),
                total_items: 0,
                total_pages: 0,
                page: 1,
            },
            curser_row: 0,
            curser_column: 0,
            ui_width: usize::MAX,
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            runtime,
        };
        model.set_status_message("Press i to import a file, ? for help");
        model.refresh();
        Ok(model)
    }

    /// Imports `path` and replaces the records on success.
    ///
    /// A rejected import keeps the current records and raises the error banner.
    pub fn load_data_file(&mut self, path: &Path) -> bool {
        let start_time = Instant::now();
        let mut config = ImportConfig::new().start_row(self.config.start_row);
        if let Some(sheet) = &self.config.sheet_name {
            config = config.sheet_name(sheet.as_str());
        }

        let result = self.runtime.block_on(bridge::import_file(path, &config));
        match result {
            ImportResult::Imported(records) => {
                info!(
                    "Loaded {} records from {} in {}ms",
                    records.len(),
                    path.display(),
                    start_time.elapsed().as_millis()
                );
                self.set_records(records);
                self.source = Some(path.to_path_buf());
                self.uidata.name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.uidata.banner = None;
                self.set_status_message(format!("Loaded {} records", self.records.len()));
                true
            }
            rejected => {
                let message = rejected.error_message().unwrap_or_default();
                warn!("Import of {} rejected: {message}", path.display());
                self.show_banner(format!("Import failed: {message}"));
                false
            }
        }
    }

    /// Writes the filtered and sorted rows of every page to `<export_dir>/<file_name>.xlsx`.
    pub fn export_view(&mut self, file_name: &str) -> Option<PathBuf> {
        let rows = self
            .view
            .ordered_with(&self.records, &self.columns, &self.collation);
        let spec = ExportSpec::new(file_name.trim()).sheet_name(DEFAULT_SHEET_NAME);
        match bridge::export_file(&rows, &spec, &self.config.export_dir) {
            Ok(path) => {
                self.set_status_message(format!("Exported {} rows to {}", rows.len(), path.display()));
                Some(path)
            }
            Err(e) => {
                warn!("Export failed: {e}");
                self.show_banner(format!("Export failed: {e}"));
                None
            }
        }
    }

    pub fn set_records(&mut self, records: Vec<Record>) {
        self.columns = ColumnDescriptor::for_records(&records)
            .into_iter()
            .map(|column| self.with_currency(column))
            .collect();
        self.records = records;
        self.view = ViewState::new(self.config.page_size);
        self.curser_row = 0;
        self.curser_column = 0;
        self.refresh();
    }

    fn with_currency(&self, mut column: ColumnDescriptor<Record>) -> ColumnDescriptor<Record> {
        if !self.config.currency_columns.contains(&column.key) {
            return column;
        }
        let locale = self.config.locale.clone();
        let key = column.key.clone();
        column.title = format!("{}, {}", column.title, locale.currency_code);
        column.render(move |record: &Record| {
            let value = record.value(&key);
            match value.as_f64() {
                Some(amount) => locale.format_currency(amount),
                None => locale.format_value(&value),
            }
        })
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.uidata.status_message = message.into();
        self.uidata.last_update = Instant::now();
    }

    fn show_banner(&mut self, message: String) {
        self.uidata.banner = Some(message);
        self.uidata.last_update = Instant::now();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized! w:{}->{}, h:{}", self.ui_width, width, height);
        self.ui_width = width;
        self.update_table_data();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), GridError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::NextPage => self.change_page(|v, total| v.next_page(total)),
                    Message::PrevPage => self.change_page(|v, _| v.prev_page()),
                    Message::FirstPage => self.change_page(|v, _| v.first_page()),
                    Message::LastPage => self.change_page(|v, total| v.last_page(total)),
                    Message::ToggleSort => self.sort_current_column(None),
                    Message::SortAscending => {
                        self.sort_current_column(Some(SortDirection::Ascending))
                    }
                    Message::SortDescending => {
                        self.sort_current_column(Some(SortDirection::Descending))
                    }
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::ClearSearch => self.search(""),
                    Message::Import => self.enter_cmd_mode(CMDMode::Import),
                    Message::Export => self.enter_cmd_mode(CMDMode::Export),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_help(),
                    Message::Enter => self.enter(),
                    Message::Exit => self.exit(),
                    Message::RawKey(_) => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Help => self.show_help(),
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if self.modus == Modus::TABLE && !self.page.rows.is_empty() {
            self.previous_modus = Modus::TABLE;
            self.modus = Modus::RECORD;
            self.uidata.show_record = true;
            self.update_record_data();
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                if self.uidata.banner.take().is_some() {
                    trace!("Banner dismissed");
                    self.uidata.last_update = Instant::now();
                }
            }
            Modus::RECORD => {
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
                self.uidata.show_record = false;
                self.uidata.last_update = Instant::now();
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
                self.uidata.last_update = Instant::now();
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
            self.uidata.cmdinput = self.last_input.clone();
            self.uidata.cmd_mode = self.cmd_mode;
            self.uidata.last_update = Instant::now();
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        let prefill = match mode {
            CMDMode::Search => self.view.search.clone(),
            CMDMode::Import => self
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            CMDMode::Export => self.default_export_name(),
        };
        self.input.set(&prefill);
        self.last_input = self.input.get();

        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.last_update = Instant::now();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.uidata.active_cmdinput = self.active_cmdinput;

        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            debug!("Command {mode:?} canceled");
            return;
        }
        let cmd_input = self.last_input.input.clone();
        match mode {
            Some(CMDMode::Search) => self.search(&cmd_input),
            Some(CMDMode::Import) => match expand_path(cmd_input.trim()) {
                Ok(path) => {
                    self.load_data_file(&path);
                }
                Err(e) => self.show_banner(e.to_string()),
            },
            Some(CMDMode::Export) => {
                self.export_view(&cmd_input);
            }
            None => info!("Cmd mode is none!"),
        }
    }

    fn default_export_name(&self) -> String {
        self.source
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| format!("{}_export", s.to_string_lossy()))
            .unwrap_or_else(|| "export".to_string())
    }

    fn search(&mut self, term: &str) {
        info!("Search for {term:?}");
        self.view.set_search(term);
        self.curser_row = 0;
        self.refresh();
        self.set_status_message(format!("{} matches", self.page.total_items));
    }

    // None cycles the sort on the current column.
    fn sort_current_column(&mut self, direction: Option<SortDirection>) {
        let Some(column) = self.columns.get(self.curser_column) else {
            return;
        };
        if !column.sortable {
            let message = format!("Column {} is not sortable", column.title);
            self.set_status_message(message);
            return;
        }
        let key = column.key.clone();
        match direction {
            Some(direction) => self.view.set_sort(&key, direction),
            None => self.view.toggle_sort(&key),
        }
        debug!("Sort is now {:?}", self.view.sort);
        self.curser_row = 0;
        self.refresh();
    }

    fn change_page(&mut self, step: impl FnOnce(&mut ViewState, usize)) {
        let before = self.view.page;
        step(&mut self.view, self.page.total_pages);
        if self.view.page != before {
            self.curser_row = 0;
            self.refresh();
        }
    }

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.view.page > 1 {
            self.view.prev_page();
            self.refresh();
            self.curser_row = self.page.rows.len().saturating_sub(1);
        }
        self.after_cursor_move();
    }

    fn move_selection_down(&mut self) {
        if self.curser_row + 1 < self.page.rows.len() {
            self.curser_row += 1;
        } else if usize::try_from(self.view.page).is_ok_and(|p| p < self.page.total_pages) {
            self.view.next_page(self.page.total_pages);
            self.curser_row = 0;
            self.refresh();
        }
        self.after_cursor_move();
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.after_cursor_move();
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.columns.len() {
            self.curser_column += 1;
        }
        self.after_cursor_move();
    }

    fn after_cursor_move(&mut self) {
        trace!(
            "Cursor at row {} column {} on page {}",
            self.curser_row, self.curser_column, self.view.page
        );
        self.uidata.selected_row = self.curser_row;
        self.uidata.selected_column = self.curser_column;
        if self.modus == Modus::RECORD {
            self.update_record_data();
        }
        self.uidata.last_update = Instant::now();
    }

    // ------------------------- View building ------------------------------ //

    fn refresh(&mut self) {
        self.page = self
            .view
            .apply_with(&self.records, &self.columns, &self.collation);
        if self.page.rows.is_empty() && self.page.total_pages > 0 {
            // the current page fell off the end, e.g. after a sort reset
            self.view.set_page(self.view.page, self.page.total_pages);
            self.page = self
                .view
                .apply_with(&self.records, &self.columns, &self.collation);
        }
        self.curser_row = self.curser_row.min(self.page.rows.len().saturating_sub(1));
        self.curser_column = self.curser_column.min(self.columns.len().saturating_sub(1));
        self.update_table_data();
    }

    fn update_table_data(&mut self) {
        let locale = &self.config.locale;
        let rows: Vec<Vec<String>> = self
            .page
            .rows
            .iter()
            .map(|r| self.columns.iter().map(|c| c.display(r, locale)).collect())
            .collect();

        let headers: Vec<String> = self
            .columns
            .iter()
            .map(|c| match self.view.sort_direction(&c.key) {
                Some(direction) => format!("{} {}", c.title, direction.marker()),
                None => c.title.clone(),
            })
            .collect();

        let max_width = MAX_COLUMN_WIDTH.min(self.ui_width.max(MIN_COLUMN_WIDTH));
        let widths = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| match c.width {
                Some(w) => w,
                None => {
                    let content = rows
                        .iter()
                        .map(|r| r[idx].chars().count())
                        .chain(std::iter::once(headers[idx].chars().count()))
                        .max()
                        .unwrap_or(0);
                    u16::try_from(content.clamp(MIN_COLUMN_WIDTH, max_width)).unwrap_or(u16::MAX)
                }
            })
            .collect();

        self.uidata.headers = headers;
        self.uidata.widths = widths;
        self.uidata.rows = rows;
        self.uidata.selected_row = self.curser_row;
        self.uidata.selected_column = self.curser_column;
        self.uidata.page = self.page.page;
        self.uidata.first_row = usize::try_from((self.page.page - 1).saturating_mul(self.view.page_size))
            .unwrap_or_default();
        self.uidata.total_pages = self.page.total_pages;
        self.uidata.total_items = self.page.total_items;
        self.uidata.search = self.view.search.clone();
        self.uidata.last_update = Instant::now();
    }

    fn update_record_data(&mut self) {
        let Some(record) = self.page.rows.get(self.curser_row) else {
            self.uidata.record.clear();
            return;
        };
        let locale = &self.config.locale;
        self.uidata.record = self
            .columns
            .iter()
            .map(|c| (c.title.clone(), c.display(record, locale)))
            .collect();
    }
}
