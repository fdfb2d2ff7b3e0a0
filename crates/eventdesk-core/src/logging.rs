use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{Subscriber, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::time::{LocalTime, UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::config_directory;

const LOG_FILE_NAME: &str = "eventdesk.log";
const LOG_FILTER_ENV: &str = "EVENTDESK_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingDestination {
    /// JSON file plus human-readable stderr, for `--verbose` runs.
    FileAndStderr,
    /// JSON file only; keeps the interactive menu readable.
    FileOnly,
    StderrOnly,
}

impl LoggingDestination {
    fn writes_file(self) -> bool {
        !matches!(self, LoggingDestination::StderrOnly)
    }

    fn writes_stderr(self) -> bool {
        !matches!(self, LoggingDestination::FileOnly)
    }
}

#[derive(Debug)]
struct InstalledLogging {
    _flush_guard: Option<WorkerGuard>,
    log_path: Option<PathBuf>,
}

static INSTALLED: OnceLock<InstalledLogging> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("invalid log filter '{directive}': {source}")]
    Filter { directive: String, source: ParseError },
    #[error("a global logger is already installed: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber, writing files under `<config dir>/logs`.
///
/// Only the first call installs anything; later calls report the path chosen then.
pub fn init_logging(
    destination: LoggingDestination,
) -> Result<Option<&'static PathBuf>, LoggingError> {
    init_logging_in(destination, &log_directory())
}

/// Same as [`init_logging`] with an explicit log directory.
pub fn init_logging_in(
    destination: LoggingDestination,
    directory: &Path,
) -> Result<Option<&'static PathBuf>, LoggingError> {
    if INSTALLED.get().is_none() {
        let installed = install(destination, directory)?;
        // A racing caller may have won; its subscriber is the live one.
        let _ = INSTALLED.set(installed);
    }
    Ok(current_log_path())
}

pub fn current_log_path() -> Option<&'static PathBuf> {
    INSTALLED.get().and_then(|state| state.log_path.as_ref())
}

pub fn log_directory() -> PathBuf {
    config_directory().join("logs")
}

fn install(
    destination: LoggingDestination,
    directory: &Path,
) -> Result<InstalledLogging, LoggingError> {
    let directive = filter_directive(
        env::var(LOG_FILTER_ENV).ok(),
        env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let filter = EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter {
        directive: directive.clone(),
        source,
    })?;

    let (file, flush_guard, log_path) = if destination.writes_file() {
        let (layer, guard, path) = json_file_layer(directory)?;
        (Some(layer), Some(guard), Some(path))
    } else {
        (None, None, None)
    };
    let stderr = destination.writes_stderr().then(stderr_layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(file)
        .with(stderr)
        .try_init()?;

    if let Some(path) = &log_path {
        info!(path = %path.display(), %directive, "logging to file");
    }

    Ok(InstalledLogging {
        _flush_guard: flush_guard,
        log_path,
    })
}

fn json_file_layer<S>(directory: &Path) -> Result<(BoxedLayer<S>, WorkerGuard, PathBuf), LoggingError>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fs::create_dir_all(directory).map_err(|source| LoggingError::Directory {
        path: directory.to_path_buf(),
        source,
    })?;
    let appender = tracing_appender::rolling::never(directory, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(writer)
        .with_ansi(false)
        .boxed();
    Ok((layer, guard, directory.join(LOG_FILE_NAME)))
}

fn stderr_layer<S>() -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(false)
        .boxed()
}

/// `EVENTDESK_LOG` wins over `RUST_LOG`; blank values count as unset.
fn filter_directive(app: Option<String>, fallback: Option<String>) -> String {
    [app, fallback]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}
