//! One-call construction from an SVMLight file.

use std::{fmt, path::Path, sync::Arc};

use svmload_core::{BuildError, CsrBuilder, IndexBase, ProgressSink, SparseMatrix};
use svmload_providers_text::{DEFAULT_BATCH_BYTES, LibSvmError, LibSvmOptions, LibSvmSource};
use thiserror::Error;
use tracing::instrument;

/// Settings for [`load_svmlight`].
///
/// # Examples
/// ```
/// use svmload::{IndexBase, LoadOptions};
///
/// let options = LoadOptions::new()
///     .with_threads(4)
///     .with_index_base(IndexBase::One)
///     .with_batch_bytes(1 << 20);
/// assert_eq!(options.threads(), 4);
/// assert_eq!(options.index_base(), IndexBase::One);
/// ```
#[derive(Clone)]
pub struct LoadOptions {
    threads: usize,
    verbose: bool,
    index_base: IndexBase,
    batch_bytes: usize,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            verbose: false,
            index_base: IndexBase::Zero,
            batch_bytes: DEFAULT_BATCH_BYTES,
            sink: None,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("threads", &self.threads)
            .field("verbose", &self.verbose)
            .field("index_base", &self.index_base)
            .field("batch_bytes", &self.batch_bytes)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl LoadOptions {
    /// Defaults: all cores, quiet, zero-based indices, 16 MiB batches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker cap for both parsing and assembly; `0` uses every core.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Reports the running row count after each batch.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Selects how source indices map to columns.
    #[must_use]
    pub fn with_index_base(mut self, index_base: IndexBase) -> Self {
        self.index_base = index_base;
        self
    }

    /// Bytes of input read per batch.
    #[must_use]
    pub fn with_batch_bytes(mut self, batch_bytes: usize) -> Self {
        self.batch_bytes = batch_bytes;
        self
    }

    /// Destination for verbose progress; `tracing` when unset.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Requested worker cap.
    #[must_use]
    #[rustfmt::skip]
    pub fn threads(&self) -> usize { self.threads }

    /// Whether progress is reported.
    #[must_use]
    #[rustfmt::skip]
    pub fn verbose(&self) -> bool { self.verbose }

    /// Configured index base.
    #[must_use]
    #[rustfmt::skip]
    pub fn index_base(&self) -> IndexBase { self.index_base }

    /// Byte budget of one batch.
    #[must_use]
    #[rustfmt::skip]
    pub fn batch_bytes(&self) -> usize { self.batch_bytes }

    fn builder(&self) -> CsrBuilder {
        let builder = CsrBuilder::new()
            .with_threads(self.threads)
            .with_verbose(self.verbose)
            .with_index_base(self.index_base);
        match &self.sink {
            Some(sink) => builder.with_progress_sink(Arc::clone(sink)),
            None => builder,
        }
    }

    fn reader_options(&self) -> LibSvmOptions {
        LibSvmOptions::default()
            .with_threads(self.threads)
            .with_batch_bytes(self.batch_bytes)
    }
}

/// Errors returned by [`load_svmlight`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The file could not be opened or the reader could not start.
    #[error("failed to open `{path}`: {source}")]
    Open {
        /// Path as given by the caller.
        path: String,
        /// Why the reader could not start.
        #[source]
        source: LibSvmError,
    },
    /// Reading, parsing or assembly failed.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl LoadError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "LOAD_OPEN",
            Self::Build(err) => match err.source_code() {
                Some(code) => code.as_str(),
                None => err.code().as_str(),
            },
        }
    }
}

/// Parses the SVMLight file at `path` into a [`SparseMatrix`].
///
/// # Errors
/// Returns [`LoadError::Open`] when the file cannot be opened and
/// [`LoadError::Build`] for parse, I/O or dimension failures. No partial
/// matrix is ever returned.
///
/// # Examples
/// ```
/// use std::io::Write;
/// use svmload::{LoadOptions, load_svmlight};
///
/// let mut file = tempfile::NamedTempFile::new()?;
/// writeln!(file, "1.0 0:0.5 2:1.5")?;
/// writeln!(file, "0.0 1:2.0")?;
/// let matrix = load_svmlight(file.path(), &LoadOptions::new().with_threads(2))?;
/// assert_eq!(matrix.dimensions().to_string(), "2 x 3 (3 nonzero)");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_svmlight(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<SparseMatrix, LoadError> {
    load_path(path.as_ref(), options)
}

#[instrument(
    name = "load.svmlight",
    err,
    skip(path, options),
    fields(path = %path.display(), threads = options.threads)
)]
fn load_path(path: &Path, options: &LoadOptions) -> Result<SparseMatrix, LoadError> {
    let mut source = LibSvmSource::open(path, options.reader_options()).map_err(|source| {
        LoadError::Open {
            path: path.display().to_string(),
            source,
        }
    })?;
    Ok(options.builder().build(&mut source)?)
}
