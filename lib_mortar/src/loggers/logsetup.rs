//! # Tracing Setup
//!
//! Console plus optional JSON rolling-file logging for the command-line tools.
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to executables.

use std::env;
use std::io;
use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_level`. When
/// `LOG_DIR` is set, a daily-rolling JSON file named after `app_name` is
/// written there as well; the returned guard flushes it on drop and must be
/// held until the program exits.
pub fn setup_logging(app_name: &str, default_level: &str) -> io::Result<Option<WorkerGuard>> {
    let log_level: String = env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());

    let env_filter: EnvFilter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    // Console output goes to stderr so stdout stays clean for command results.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(io::stderr);

    let (file_layer, guard) = match env::var("LOG_DIR") {
        Ok(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;
            let (writer, guard) = file_writer(Path::new(&log_dir), app_name);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    info!("Logging initialized with level: {}", log_level);
    Ok(guard)
}

fn file_writer(log_dir: &Path, app_name: &str) -> (non_blocking::NonBlocking, WorkerGuard) {
    let file_appender = rolling::daily(log_dir, app_name);
    non_blocking(file_appender)
}
