use std::sync::Arc;

use svmload_core::BatchSourceError;
use thiserror::Error;

/// Errors raised while reading SVMLight text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LibSvmError {
    /// A line holds a malformed token.
    #[error("line {line}: {reason}")]
    Parse {
        /// One-based physical line.
        line: u64,
        /// What was wrong with the line.
        reason: String,
    },
    /// The batch byte budget was zero.
    #[error("batch size must be at least one byte")]
    ZeroBatchBytes,
    /// The parser pool could not be built.
    #[error("failed to start {threads} parser threads: {reason}")]
    ThreadPool {
        /// Threads requested after clamping.
        threads: usize,
        /// Failure reported by rayon.
        reason: String,
    },
    /// Opening or reading the input failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibSvmError {
    pub(crate) fn parse(line: u64, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Converts the error into the core taxonomy, attributing I/O failures to
    /// the input called `name`.
    #[must_use]
    pub fn into_batch_source_error(self, name: &str) -> BatchSourceError {
        match self {
            Self::Parse { line, reason } => BatchSourceError::Parse {
                line,
                reason: Arc::from(reason),
            },
            Self::Io(err) => BatchSourceError::Resource {
                name: Arc::from(name),
                reason: Arc::from(err.to_string()),
            },
            other => BatchSourceError::Resource {
                name: Arc::from(name),
                reason: Arc::from(other.to_string()),
            },
        }
    }
}
