//! Error types for the svmload core library.
//!
//! Defines the error enums exposed by the public API, their stable
//! machine-readable codes, and a convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced by a [`crate::BatchSource`] while yielding record batches.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BatchSourceError {
    /// A line of the input could not be tokenised.
    #[error("parse error on line {line}: {reason}")]
    Parse {
        /// One-based physical line number of the offending record.
        line: u64,
        /// Description of the rejected token.
        reason: Arc<str>,
    },
    /// The underlying byte source could not be opened or read.
    #[error("failed to read `{name}`: {reason}")]
    Resource {
        /// Path or identifier of the byte source.
        name: Arc<str>,
        /// Message reported by the operating system.
        reason: Arc<str>,
    },
    /// A batch violated its own structural contract.
    #[error("malformed record batch: {reason}")]
    MalformedBatch {
        /// Which structural rule the batch broke.
        reason: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`BatchSourceError`] variants.
    enum BatchSourceErrorCode for BatchSourceError {
        /// A line of the input could not be tokenised.
        Parse => Parse { .. } => "BATCH_SOURCE_PARSE",
        /// The underlying byte source could not be opened or read.
        Resource => Resource { .. } => "BATCH_SOURCE_RESOURCE",
        /// A batch violated its own structural contract.
        MalformedBatch => MalformedBatch { .. } => "BATCH_SOURCE_MALFORMED_BATCH",
    }
}

/// Per-row sequence checked against the row count once all batches are in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RowField {
    /// Instance labels.
    Label,
    /// Instance weights.
    Weight,
    /// Query identifiers.
    QueryId,
}

impl RowField {
    /// Lower-case name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Weight => "weight",
            Self::QueryId => "qid",
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced while building a [`crate::SparseMatrix`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BuildError {
    /// A per-row sequence was present but did not cover every row.
    #[error("{field} count {count} != row count {rows}")]
    DimensionMismatch {
        /// Sequence whose length disagreed with the row count.
        field: RowField,
        /// Number of entries collected for the sequence.
        count: usize,
        /// Number of rows assembled.
        rows: usize,
    },
    /// A feature index of zero was seen while indices were declared one-based.
    #[error("feature index {index} is invalid for one-based indexing")]
    InvalidIndex {
        /// The rejected feature index.
        index: u32,
    },
    /// The worker pool could not be created.
    #[error("failed to start {threads} worker threads: {reason}")]
    ThreadPool {
        /// Resolved worker count that was requested from the pool.
        threads: usize,
        /// Message reported by the pool builder.
        reason: Arc<str>,
    },
    /// The [`crate::BatchSource`] failed while yielding batches.
    #[error("batch source `{source_name}` failed: {error}")]
    Source {
        /// Identifier for the batch source that produced the error.
        source_name: Arc<str>,
        #[source]
        /// Underlying batch source error.
        error: BatchSourceError,
    },
}

define_error_codes! {
    /// Stable codes describing [`BuildError`] variants.
    enum BuildErrorCode for BuildError {
        /// A per-row sequence was present but did not cover every row.
        DimensionMismatch => DimensionMismatch { .. } => "BUILD_DIMENSION_MISMATCH",
        /// A zero feature index was seen under one-based indexing.
        InvalidIndex => InvalidIndex { .. } => "BUILD_INVALID_INDEX",
        /// The worker pool could not be created.
        ThreadPool => ThreadPool { .. } => "BUILD_THREAD_POOL",
        /// The batch source failed while yielding batches.
        SourceFailure => Source { .. } => "BUILD_SOURCE_FAILURE",
    }
}

impl BuildError {
    /// Retrieve the inner [`BatchSourceErrorCode`] when the error originated in a
    /// [`crate::BatchSource`].
    #[must_use]
    pub const fn source_code(&self) -> Option<BatchSourceErrorCode> {
        match self {
            Self::Source { error, .. } => Some(error.code()),
            _ => None,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, BuildError>;
