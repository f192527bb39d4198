//! Logging setup.
//!
//! The library itself only emits `tracing` events. Hosts (and the CLI) call
//! one of the initializers here once at startup:
//! - [`init_logging`] writes to stdout and to `<log_dir>/<log_file>` (cleared
//!   on start)
//! - [`init_stdout_logging`] writes to stdout only
//!
//! Both honor `RUST_LOG` and default to `info`. With the `profiling` feature a
//! Chrome trace (`trace-*.json`) is recorded as well.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    #[cfg(feature = "profiling")]
    _chrome_guard: tracing_chrome::FlushGuard,
}

/// Installs stdout and file logging.
///
/// Creates `log_dir` if needed and truncates any previous log file.
///
/// # Errors
///
/// Fails if the directory or file cannot be created, or if a global
/// subscriber is already installed.
pub fn init_logging(log_dir: &str, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(Path::new(log_dir).join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_thread_names(true);

    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stdout_layer);

    #[cfg(feature = "profiling")]
    {
        let (chrome_layer, chrome_guard) = tracing_chrome::ChromeLayerBuilder::new()
            .include_args(true)
            .build();
        registry.with(chrome_layer).try_init().map_err(already_set)?;
        Ok(LoggingGuard {
            _file_guard: Some(file_guard),
            _chrome_guard: chrome_guard,
        })
    }

    #[cfg(not(feature = "profiling"))]
    {
        registry.try_init().map_err(already_set)?;
        Ok(LoggingGuard {
            _file_guard: Some(file_guard),
        })
    }
}

/// Installs stdout-only logging.
pub fn init_stdout_logging() -> Result<LoggingGuard, io::Error> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_thread_names(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer);

    #[cfg(feature = "profiling")]
    {
        let (chrome_layer, chrome_guard) = tracing_chrome::ChromeLayerBuilder::new().build();
        registry.with(chrome_layer).try_init().map_err(already_set)?;
        Ok(LoggingGuard {
            _file_guard: None,
            _chrome_guard: chrome_guard,
        })
    }

    #[cfg(not(feature = "profiling"))]
    {
        registry.try_init().map_err(already_set)?;
        Ok(LoggingGuard { _file_guard: None })
    }
}

/// Default log directory.
pub fn default_log_dir() -> &'static str {
    "logs"
}

/// Default log file name.
pub fn default_log_file() -> &'static str {
    "tilestream.log"
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn already_set(err: tracing_subscriber::util::TryInitError) -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, err)
}
