//! Benchmark support crate for svmload.
//!
//! Provides parameter types and pre-parsed inputs for the Criterion
//! benchmarks of matrix construction.

pub mod params;
pub mod source;
