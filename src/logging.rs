//! Logging setup for the command line tools.
//!
//! Logs go to stderr so that stdout only carries the pivot output. An
//! optional log file receives everything at the debug level.

use std::{fs::OpenOptions, path::Path, sync::Arc};

use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::Error;

/// Install the global tracing subscriber.
///
/// Stderr logs at `WARN`, or `DEBUG` when `verbose` is set. The `RUST_LOG`
/// environment variable overrides either level.
///
/// # Errors
/// Returns [Error::LoggingError] if the log file cannot be opened or a
/// subscriber has already been installed.
pub fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<(), Error> {
    let default_level = if verbose { "debug" } else { "warn" };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let file_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|error| Error::LoggingError(format!("{}: {error}", path.display())))?;

            Some(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(file_log)
        .try_init()
        .map_err(|error| Error::LoggingError(error.to_string()))
}
