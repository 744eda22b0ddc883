//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. Both sinks share
//! one format: human-readable text or one JSON object per line.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use trackrelay_domain::constants::{LOG_FILE_PREFIX, LOG_FILE_SUFFIX};
use trackrelay_domain::{LogFormat, LoggingConfig, RelayError, Result};

/// Keeps the background file writer alive; drop it last to flush.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `RelayError::Config` for an invalid filter directive, an unusable
/// log directory, or when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(&config.level)?;
    let appender = build_file_appender(Path::new(&config.directory))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let json = config.format == LogFormat::Json;
    let stdout_text = (!json).then(fmt::layer);
    let stdout_json = json.then(|| fmt::layer().json().with_current_span(true));
    let file_text =
        (!json).then(|| fmt::layer().with_ansi(false).with_writer(file_writer.clone()));
    let file_json =
        json.then(|| fmt::layer().json().with_current_span(true).with_writer(file_writer));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_text)
        .with(stdout_json)
        .with(file_text)
        .with(file_json)
        .try_init()
        .map_err(|e| RelayError::Config(format!("Failed to install log subscriber: {e}")))?;

    tracing::debug!(
        directory = %config.directory,
        format = %config.format,
        "Logging initialized"
    );
    Ok(LoggingGuard { _file: guard })
}

/// Filter from `RUST_LOG`, else from `level`.
///
/// # Errors
/// Returns `RelayError::Config` when neither yields a valid directive.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| RelayError::Config(format!("Invalid log level {level:?}: {e}"))),
    }
}

/// Daily-rolling `trackrelay.<date>.log` appender under `directory`.
///
/// # Errors
/// Returns `RelayError::Config` when the directory cannot be created.
pub fn build_file_appender(directory: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(directory).map_err(|e| {
        RelayError::Config(format!("Cannot create log directory {}: {e}", directory.display()))
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(directory)
        .map_err(|e| RelayError::Config(format!("Cannot open log file: {e}")))
}
