//! Tracing subscriber installation
//!
//! Stdout always gets a `fmt` layer in the configured format. When a log
//! directory is configured, a second non-blocking layer writes daily-rolling
//! files there. `RUST_LOG` overrides the configured level.

use timekeep_domain::{AttendanceError, LogFormat, LoggingConfig, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "timekeep";
const LOG_FILE_SUFFIX: &str = "log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; hold it for the
/// lifetime of the process.
///
/// # Errors
/// `AttendanceError::Config` for an invalid filter directive, an unusable
/// log directory, or a subscriber that is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(std::env::var("RUST_LOG").ok(), &config.level)?;

    let (file_writer, guard) = match config.directory.as_deref() {
        Some(directory) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(directory)?);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true))
            .with(file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer)))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .with(file_writer.map(|writer| fmt::layer().json().with_writer(writer)))
            .try_init(),
    };
    installed.map_err(|e| {
        AttendanceError::Config(format!("failed to install tracing subscriber: {e}"))
    })?;

    tracing::debug!(level = %config.level, format = ?config.format, "logging.initialized");
    Ok(guard)
}

fn env_filter(rust_log: Option<String>, level: &str) -> Result<EnvFilter> {
    let directives = rust_log.filter(|value| !value.trim().is_empty());
    let source = directives.as_deref().unwrap_or(level);
    EnvFilter::try_new(source)
        .map_err(|e| AttendanceError::Config(format!("invalid log filter `{source}`: {e}")))
}

fn file_appender(directory: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(directory)
        .map_err(|e| AttendanceError::Config(format!("cannot open log directory `{directory}`: {e}")))
}
