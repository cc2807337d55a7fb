use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use brokergrid::controller::Controller;
use brokergrid::domain::{GridConfig, GridError, expand_path};
use brokergrid::format::LocaleFormat;
use brokergrid::logging::init_tracing;
use brokergrid::model::{Model, Status};
use brokergrid::ui::TableUI;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Browse, search, sort and page through spreadsheet records.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Spreadsheet to open on start
    file: Option<String>,

    /// Sheet to import instead of the first one
    #[arg(long)]
    sheet: Option<String>,

    /// Leading rows to skip, counted including the header row
    #[arg(long, default_value_t = 1)]
    start_row: usize,

    #[arg(long, default_value_t = 20)]
    page_size: i64,

    /// ru-RU or en-US
    #[arg(long, default_value = "ru-RU")]
    locale: String,

    /// Directory exports are written into
    #[arg(long, default_value = ".")]
    export_dir: String,

    #[arg(long, default_value = "brokergrid.log")]
    log_file: String,

    /// Hide the row number column
    #[arg(long)]
    no_index: bool,

    /// Render this column as money, may be repeated
    #[arg(long = "currency", value_name = "COLUMN")]
    currency: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn build_config(cli: &Cli) -> Result<GridConfig, GridError> {
    let locale = LocaleFormat::from_tag(&cli.locale)
        .ok_or_else(|| GridError::UnknownLocale(cli.locale.clone()))?;
    Ok(GridConfig::default()
        .page_size(cli.page_size)
        .locale(locale)
        .export_dir(expand_path(&cli.export_dir)?)
        .sheet_name(cli.sheet.clone())
        .start_row(cli.start_row)
        .log_file(expand_path(&cli.log_file)?)
        .show_index(!cli.no_index)
        .currency_columns(cli.currency.clone()))
}

fn check_file_type(path: &Path) -> Result<(), GridError> {
    let supported = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
    if supported {
        Ok(())
    } else {
        Err(GridError::UnknownFileType(path.to_path_buf()))
    }
}

fn run(cli: Cli) -> Result<(), GridError> {
    let cfg = build_config(&cli)?;
    init_tracing(&cfg.log_file)?;
    info!("Starting brokergrid with {cfg:?}");

    let file: Option<PathBuf> = cli.file.as_deref().map(expand_path).transpose()?;
    if let Some(path) = &file {
        check_file_type(path)?;
    }

    let mut model = Model::init(&cfg)?;
    if let Some(path) = &file {
        model.load_data_file(path);
    }

    let mut terminal = ratatui::init();
    let result = event_loop(&cfg, &mut model, &mut terminal);
    ratatui::restore();
    info!("Bye");
    result
}

fn event_loop(
    cfg: &GridConfig,
    model: &mut Model,
    terminal: &mut ratatui::DefaultTerminal,
) -> Result<(), GridError> {
    let ui = TableUI::new(cfg);
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
