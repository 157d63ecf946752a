//! Benchmark parameter types.

use std::fmt;

/// Parameters for one build benchmark run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BuildBenchParams {
    /// Number of rows in the corpus.
    pub rows: usize,
    /// Worker threads requested from the builder.
    pub threads: usize,
}

impl fmt::Display for BuildBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},threads={}", self.rows, self.threads)
    }
}
