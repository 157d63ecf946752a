//! SVMLight/LibSVM text provider implementing `BatchSource`.

mod errors;
mod parse;
mod source;

pub use errors::LibSvmError;
pub use source::{DEFAULT_BATCH_BYTES, LibSvmOptions, LibSvmSource};
