//! Logging initialisation
//!
//! Console output plus a daily-rotated log file. `RUST_LOG`, when set, overrides the
//! configured level.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Map a configured level name to a `tracing` filter directive
///
/// Accepts `DEBUG`, `INFO`, `WARNING`, `ERROR` and `CRITICAL` in any case.
pub fn level_directive(level: &str) -> Option<&'static str> {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARNING" | "WARN" => Some("warn"),
        "ERROR" | "CRITICAL" => Some("error"),
        _ => None,
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer when dropped; keep it alive for the
/// lifetime of the process.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unknown level or an unusable log path, and
/// [`Error::Other`] if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let directive = level_directive(&config.level).ok_or_else(|| {
        Error::config("logging.level", format!("unknown log level '{}'", config.level))
    })?;

    let (dir, prefix, suffix) = split_log_path(&config.file_path);
    std::fs::create_dir_all(&dir).map_err(|e| {
        Error::config(
            "logging.file_path",
            format!("cannot create log directory {}: {}", dir.display(), e),
        )
    })?;

    let mut builder = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(config.backup_count.saturating_add(1));
    if let Some(suffix) = suffix {
        builder = builder.filename_suffix(suffix);
    }
    let appender = builder
        .build(&dir)
        .map_err(|e| Error::config("logging.file_path", format!("cannot open log file: {}", e)))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

/// Split `logs/tubeshelf.log` into (`logs`, `tubeshelf`, `Some("log")`)
fn split_log_path(path: &Path) -> (std::path::PathBuf, String, Option<String>) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tubeshelf")
        .to_string();
    let suffix = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_string);
    (dir, prefix, suffix)
}
