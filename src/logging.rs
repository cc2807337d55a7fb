use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::domain::GridError;

pub const LOG_ENV_VAR: &str = "BROKERGRID_LOG";

/// Routes all tracing output into `log_file`. The terminal belongs to the ui.
pub fn init_tracing(log_file: &Path) -> Result<(), GridError> {
    let file = File::create(log_file)?;
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .map_err(|e| GridError::Logging(e.to_string()))
}
