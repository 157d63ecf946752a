//! Structured diagnostics for the `svmload` binary.
//!
//! Diagnostics go to `stderr`; the summary printed on `stdout` never mixes
//! with them. `RUST_LOG` filters events and `SVMLOAD_LOG_FORMAT` picks plain
//! text or JSON lines. Records from crates on the `log` facade are forwarded
//! into the same subscriber.

use std::{env, sync::OnceLock};

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

const FORMAT_VAR: &str = "SVMLOAD_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset or unparsable. Progress messages of
/// `--verbose` are `info` events, so they stay visible.
const DEFAULT_FILTER: &str = "info";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Reasons the diagnostics subscriber could not be configured.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `SVMLOAD_LOG_FORMAT` holds bytes that are not UTF-8.
    #[error("`{var}` is not valid UTF-8: {source}")]
    NonUtf8Var {
        /// Variable that was read.
        var: &'static str,
        /// Lookup failure.
        #[source]
        source: env::VarError,
    },
    /// `SVMLOAD_LOG_FORMAT` names a format this binary cannot write.
    #[error("unknown log format `{value}`; use `human` or `json`")]
    UnknownFormat {
        /// Normalised value that was rejected.
        value: String,
    },
    /// Another global subscriber is already registered.
    #[error("a global tracing subscriber is already registered: {source}")]
    SubscriberTaken {
        /// Failure from `tracing_subscriber`.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

/// How diagnostic lines are rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// Plain text lines.
    #[default]
    Human,
    /// One JSON object per line, with the active span list.
    Json,
}

impl LogFormat {
    /// Reads the format from `SVMLOAD_LOG_FORMAT`, defaulting to [`LogFormat::Human`].
    ///
    /// # Errors
    /// Returns [`LoggingError::NonUtf8Var`] or [`LoggingError::UnknownFormat`].
    pub fn from_env() -> Result<Self, LoggingError> {
        match env::var(FORMAT_VAR) {
            Ok(raw) => Self::parse(&raw),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(source) => Err(LoggingError::NonUtf8Var {
                var: FORMAT_VAR,
                source,
            }),
        }
    }

    /// Case-insensitive parse; surrounding whitespace and an empty value are
    /// accepted.
    ///
    /// # Errors
    /// Returns [`LoggingError::UnknownFormat`] for anything but `human` or `json`.
    pub fn parse(raw: &str) -> Result<Self, LoggingError> {
        let value = raw.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::UnknownFormat { value }),
        }
    }
}

/// Sets up diagnostics for the process. Only the first call does any work.
///
/// If some other subscriber already owns the global slot it is left in place
/// and the call still succeeds.
///
/// # Errors
/// Returns [`LoggingError`] when `SVMLOAD_LOG_FORMAT` cannot be used.
pub fn init_logging() -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let format = LogFormat::from_env()?;
    if let Err(err) = install(format) {
        if !matches!(err, LoggingError::SubscriberTaken { .. }) {
            return Err(err);
        }
    }
    let _ = INSTALLED.set(());
    Ok(())
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn install(format: LogFormat) -> Result<(), LoggingError> {
    let lines = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let lines = match format {
        LogFormat::Human => lines.boxed(),
        LogFormat::Json => lines
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    };

    // A `log` logger installed by someone else wins.
    let _ = LogTracer::init();

    tracing_subscriber::registry()
        .with(filter())
        .with(lines)
        .try_init()
        .map_err(|source| LoggingError::SubscriberTaken { source })
}
