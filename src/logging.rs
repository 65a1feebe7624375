/// Structured logging for the forecast table service
///
/// Every event carries a `source` field naming the upstream it concerns, so
/// a single run's output can be filtered per extractor. Console output is
/// always on; a log file can be added for scheduled (cron/systemd) runs.

use std::fmt;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt as layer_fmt, prelude::*};

use crate::model::{ForecastError, RetrievalFailure};

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// forecast.weather.gov digital DWML table
    Dwml,
    /// api.weather.gov gridpoint forecast
    Gridpoint,
    Config,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Dwml => write!(f, "DWML"),
            DataSource::Gridpoint => write!(f, "GRIDPOINT"),
            DataSource::Config => write!(f, "CONFIG"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// The default filter is `nws_forecast_table=info` (`debug` when `verbose`),
/// overridden by `RUST_LOG`. When `log_file` is given, events are also
/// appended there; the returned guard must live until the run ends or
/// buffered lines are lost.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let default_directive = if verbose {
        "nws_forecast_table=debug"
    } else {
        "nws_forecast_table=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console_layer = layer_fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "nws_forecast_table.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = layer_fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if installed.is_err() {
        // A subscriber already exists (tests, embedding); keep it.
        return None;
    }
    guard
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - upstream is known to return this transiently
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a run-terminating error.
///
/// forecast.weather.gov and api.weather.gov both answer 500/502/503 during
/// routine model updates, so those are expected. Client errors (bad
/// gridpoint, bad coordinates) and configuration problems point at this
/// deployment and are unexpected.
pub fn classify_failure(err: &ForecastError) -> FailureType {
    match err {
        ForecastError::Retrieval { kind: RetrievalFailure::Status(code), .. } => match code {
            500 | 502 | 503 | 504 => FailureType::Expected,
            400..=499 => FailureType::Unexpected,
            _ => FailureType::Unknown,
        },
        ForecastError::Retrieval { kind: RetrievalFailure::Transport(_), .. } => {
            FailureType::Unknown
        }
        ForecastError::Configuration(_) => FailureType::Unexpected,
        ForecastError::Document(_) | ForecastError::Decode { .. } => FailureType::Unexpected,
        ForecastError::Io(_) | ForecastError::Serialize(_) => FailureType::Unexpected,
    }
}

/// Log a failed operation at the level its classification calls for.
pub fn log_failure(source: DataSource, operation: &str, err: &ForecastError) {
    let failure_type = classify_failure(err);
    match failure_type {
        FailureType::Expected | FailureType::Unknown => {
            tracing::warn!(source = %source, failure = %failure_type, "{} failed: {}", operation, err)
        }
        FailureType::Unexpected => {
            tracing::error!(source = %source, failure = %failure_type, "{} failed: {}", operation, err)
        }
    }
}
