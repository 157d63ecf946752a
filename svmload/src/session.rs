//! Handle-based access to built matrices.
//!
//! A [`Session`] owns every matrix it creates and hands out copyable
//! [`MatrixHandle`]s. Handles carry the generation of their slot, so a handle
//! that outlives its matrix is detected instead of reaching reused storage.
//! Error text and the progress callback live on the session; callers that
//! need independent error state use separate sessions.

use std::{fmt, path::Path, sync::Arc};

use svmload_core::{Dimensions, NullSink, ProgressSink, SparseMatrix};
use thiserror::Error;
use tracing::debug;

use crate::load::{LoadError, LoadOptions, load_svmlight};

/// Opaque reference to a matrix owned by a [`Session`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MatrixHandle {
    slot: u32,
    generation: u32,
}

impl fmt::Display for MatrixHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

/// Errors returned by [`Session`] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The handle was released or never issued by this session.
    #[error("matrix handle {handle} is not live")]
    StaleHandle {
        /// The rejected handle.
        handle: MatrixHandle,
    },
    /// The session cannot issue more handles.
    #[error("session handle table is full")]
    Exhausted,
    /// Loading the matrix failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Read-only views of a matrix's arrays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixArrays<'a> {
    /// Nonzero values in row-major order.
    pub values: &'a [f32],
    /// Column of each value.
    pub column_indices: &'a [u32],
    /// Start of each row in `values`, plus the final length.
    pub row_offsets: &'a [usize],
    /// `None` when the source carried no labels.
    pub labels: Option<&'a [f32]>,
    /// `None` when the source carried no weights.
    pub weights: Option<&'a [f32]>,
    /// `None` when the source carried no `qid` tokens.
    pub query_ids: Option<&'a [u64]>,
}

impl<'a> From<&'a SparseMatrix> for MatrixArrays<'a> {
    fn from(matrix: &'a SparseMatrix) -> Self {
        Self {
            values: matrix.values(),
            column_indices: matrix.column_indices(),
            row_offsets: matrix.row_offsets(),
            labels: matrix.labels(),
            weights: matrix.weights(),
            query_ids: matrix.query_ids(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    matrix: Option<SparseMatrix>,
}

/// Owner of built matrices, their last error and the progress callback.
///
/// # Examples
/// ```
/// use std::io::Write;
/// use svmload::{Session, SessionError};
///
/// let mut file = tempfile::NamedTempFile::new()?;
/// writeln!(file, "1 0:0.5 2:1.5")?;
///
/// let mut session = Session::new();
/// let handle = session.create_from_file(file.path(), 0, false)?;
/// assert_eq!(session.dimensions(handle)?.num_cols, 3);
/// assert!(session.arrays(handle)?.weights.is_none());
///
/// session.release(handle)?;
/// let err = session.release(handle).expect_err("already released");
/// assert!(matches!(err, SessionError::StaleHandle { .. }));
/// assert_eq!(session.last_error(), err.to_string());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct Session {
    slots: Vec<Slot>,
    free: Vec<u32>,
    last_error: String,
    callback: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("live", &self.live())
            .field("last_error", &self.last_error)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Session {
    /// Empty session with no callback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends verbose progress messages of later loads to `callback`.
    ///
    /// Replaces any earlier callback. Without one, messages are dropped.
    pub fn register_log_callback<F>(&mut self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
    }

    /// Loads `path` and returns a handle to the new matrix.
    ///
    /// # Errors
    /// Returns [`SessionError::Load`] when loading fails; the message is also
    /// kept as [`Session::last_error`].
    pub fn create_from_file(
        &mut self,
        path: impl AsRef<Path>,
        threads: usize,
        verbose: bool,
    ) -> Result<MatrixHandle, SessionError> {
        let sink: Arc<dyn ProgressSink> = match &self.callback {
            Some(callback) => Arc::clone(callback),
            None => Arc::new(NullSink),
        };
        let options = LoadOptions::new()
            .with_threads(threads)
            .with_verbose(verbose)
            .with_progress_sink(sink);
        let result = load_svmlight(path, &options)
            .map_err(SessionError::from)
            .and_then(|matrix| self.insert(matrix));
        self.record(result)
    }

    /// Takes ownership of an already built matrix.
    ///
    /// # Errors
    /// Returns [`SessionError::Exhausted`] when no handle can be issued.
    pub fn insert(&mut self, matrix: SparseMatrix) -> Result<MatrixHandle, SessionError> {
        if let Some(slot) = self.free.pop() {
            if let Some(entry) = self.slots.get_mut(slot as usize) {
                entry.matrix = Some(matrix);
                return Ok(MatrixHandle {
                    slot,
                    generation: entry.generation,
                });
            }
        }
        let slot = u32::try_from(self.slots.len()).map_err(|_| SessionError::Exhausted)?;
        self.slots.push(Slot {
            generation: 0,
            matrix: Some(matrix),
        });
        Ok(MatrixHandle {
            slot,
            generation: 0,
        })
    }

    /// Row, column and nonzero counts of the matrix behind `handle`.
    ///
    /// # Errors
    /// Returns [`SessionError::StaleHandle`] for released or foreign handles.
    pub fn dimensions(&mut self, handle: MatrixHandle) -> Result<Dimensions, SessionError> {
        let result = self.matrix(handle).map(SparseMatrix::dimensions);
        self.record(result)
    }

    /// Borrowed arrays of the matrix behind `handle`.
    ///
    /// # Errors
    /// Returns [`SessionError::StaleHandle`] for released or foreign handles.
    pub fn arrays(&mut self, handle: MatrixHandle) -> Result<MatrixArrays<'_>, SessionError> {
        if let Err(err) = self.matrix(handle).map(|_| ()) {
            return self.record(Err(err));
        }
        self.matrix(handle).map(MatrixArrays::from)
    }

    /// Borrows the matrix behind `handle` without touching the error state.
    ///
    /// # Errors
    /// Returns [`SessionError::StaleHandle`] for released or foreign handles.
    pub fn matrix(&self, handle: MatrixHandle) -> Result<&SparseMatrix, SessionError> {
        self.slots
            .get(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.matrix.as_ref())
            .ok_or(SessionError::StaleHandle { handle })
    }

    /// Frees the matrix behind `handle` and invalidates the handle.
    ///
    /// # Errors
    /// Returns [`SessionError::StaleHandle`] when the handle is not live,
    /// including a second release of the same handle.
    pub fn release(&mut self, handle: MatrixHandle) -> Result<(), SessionError> {
        let result = self.take(handle).map(|matrix| {
            debug!(%handle, rows = matrix.num_rows(), "matrix released");
        });
        self.record(result)
    }

    /// Removes the matrix behind `handle`, handing ownership to the caller.
    ///
    /// # Errors
    /// Returns [`SessionError::StaleHandle`] when the handle is not live.
    pub fn take(&mut self, handle: MatrixHandle) -> Result<SparseMatrix, SessionError> {
        let slot = self
            .slots
            .get_mut(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(SessionError::StaleHandle { handle })?;
        let matrix = slot
            .matrix
            .take()
            .ok_or(SessionError::StaleHandle { handle })?;
        // A wrapped generation retires the slot for good.
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(handle.slot);
        }
        Ok(matrix)
    }

    /// Message of the most recent failure, or `""` if none occurred.
    #[must_use]
    #[rustfmt::skip]
    pub fn last_error(&self) -> &str { &self.last_error }

    /// Number of matrices currently owned.
    #[must_use]
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.matrix.is_some()).count()
    }

    fn record<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(err) = &result {
            self.last_error = err.to_string();
        }
        result
    }
}
