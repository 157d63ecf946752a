//! Load SVMLight/LibSVM files into compressed sparse row matrices.
//!
//! [`load_svmlight`] is the direct entry point. [`Session`] wraps it for
//! callers that address matrices through opaque handles.
//!
//! ```no_run
//! use svmload::{LoadOptions, load_svmlight};
//!
//! let matrix = load_svmlight("train.svm", &LoadOptions::new().with_verbose(true))?;
//! println!("{}", matrix.dimensions());
//! # Ok::<(), svmload::LoadError>(())
//! ```

mod load;
mod session;

pub use load::{LoadError, LoadOptions, load_svmlight};
pub use session::{MatrixArrays, MatrixHandle, Session, SessionError};
pub use svmload_core::{
    BuildError, Dimensions, IndexBase, NullSink, ProgressSink, SparseMatrix, SparseRow,
    TracingSink,
};
pub use svmload_providers_text::{LibSvmError, LibSvmOptions};
