//! svmload core library.
//!
//! Assembles compressed sparse row matrices from batches of parsed SVMLight
//! records, splitting the copy of each batch across a fixed pool of workers.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod assembler;
mod batch;
mod builder;
mod error;
mod matrix;
mod progress;
mod threads;

pub use crate::{
    assembler::ColumnSpan,
    batch::{BatchSource, InMemorySource, RecordBatch},
    builder::{CsrBuilder, IndexBase},
    error::{BatchSourceError, BatchSourceErrorCode, BuildError, BuildErrorCode, Result, RowField},
    matrix::{Dimensions, MatrixParts, SparseMatrix, SparseRow},
    progress::{NullSink, ProgressSink, TracingSink},
    threads::{max_threads, resolve_thread_count},
};
