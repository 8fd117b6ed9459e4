//! `tracing` subscriber setup for applications embedding the pool.
//!
//! The pool itself only emits events through [`TracingLogger`]; installing a
//! subscriber is the application's call. [`init_logging`] is the stock setup:
//!
//! - writes to `<dir>/<file>`, truncated when logging starts
//! - mirrors everything to stdout
//! - filtered by `RUST_LOG`, `info` when unset
//!
//! [`TracingLogger`]: crate::log::TracingLogger

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Directory used by [`init_logging`] callers that have no preference.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// File name used by [`init_logging`] callers that have no preference.
pub const DEFAULT_LOG_FILE: &str = "workerpool.log";

/// Keeps the background file writer alive.
///
/// Dropping it flushes pending lines and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Fails if the directory cannot be created, the file cannot be truncated,
/// or a global subscriber is already installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let log_path = prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::debug!(target: "workerpool", "logging to {}", log_path.display());

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Creates `log_dir` if needed and empties the log file from a previous run.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<std::path::PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;
    Ok(log_path)
}
