//! Deterministic synthetic SVMLight corpora.
//!
//! A [`Corpus`] carries both the text and the arrays a correct loader must
//! produce from it, so tests and benchmarks can compare without a reference
//! parser.

use std::fmt::Write as _;

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Shape of a generated corpus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorpusShape {
    /// Number of data lines.
    pub rows: usize,
    /// Column indices are drawn from `0..cols`.
    pub cols: u32,
    /// Upper bound on features per row; rows may be empty.
    pub max_features: usize,
    /// Emit `label:weight` on every row.
    pub weighted: bool,
    /// Emit a `qid:` token on every row.
    pub query_ids: bool,
    /// Probability that a feature is written as a bare index (value `1.0`).
    pub bare_ratio: f64,
    /// Seed for the generator.
    pub seed: u64,
}

impl Default for CorpusShape {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 32,
            max_features: 8,
            weighted: false,
            query_ids: false,
            bare_ratio: 0.0,
            seed: 0x5eed,
        }
    }
}

/// Generated text plus the CSR arrays it encodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Corpus {
    /// SVMLight text, one record per line.
    pub text: String,
    /// Expected row offsets.
    pub row_offsets: Vec<usize>,
    /// Expected column indices.
    pub column_indices: Vec<u32>,
    /// Expected values.
    pub values: Vec<f32>,
    /// Expected labels.
    pub labels: Vec<f32>,
    /// Expected weights, empty when not weighted.
    pub weights: Vec<f32>,
    /// Expected query ids, empty when not emitted.
    pub query_ids: Vec<u64>,
}

impl Corpus {
    /// Largest column index plus one, or zero without features.
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.column_indices
            .iter()
            .max()
            .map_or(0, |max| *max as usize + 1)
    }
}

/// Generates a corpus of the given shape.
///
/// Values are quarter steps so they survive the text round trip exactly.
///
/// # Examples
/// ```
/// use svmload_test_support::corpus::{CorpusShape, generate};
///
/// let corpus = generate(&CorpusShape { rows: 3, ..CorpusShape::default() });
/// assert_eq!(corpus.text.lines().count(), 3);
/// assert_eq!(corpus.row_offsets.len(), 4);
/// ```
#[must_use]
pub fn generate(shape: &CorpusShape) -> Corpus {
    let mut rng = SmallRng::seed_from_u64(shape.seed);
    let mut corpus = Corpus {
        row_offsets: vec![0],
        ..Corpus::default()
    };

    for _ in 0..shape.rows {
        let label = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        corpus.labels.push(label);
        let _ = write!(corpus.text, "{label}");

        if shape.weighted {
            let weight = f32::from(rng.gen_range(1_u8..=8)) / 2.0;
            corpus.weights.push(weight);
            let _ = write!(corpus.text, ":{weight}");
        }
        if shape.query_ids {
            let qid = rng.gen_range(1_u64..=16);
            corpus.query_ids.push(qid);
            let _ = write!(corpus.text, " qid:{qid}");
        }

        let count = if shape.cols == 0 {
            0
        } else {
            rng.gen_range(0..=shape.max_features)
        };
        let mut indices: Vec<u32> = (0..count).map(|_| rng.gen_range(0..shape.cols)).collect();
        indices.sort_unstable();
        indices.dedup();

        for index in indices {
            if rng.gen_bool(shape.bare_ratio) {
                corpus.values.push(1.0);
                let _ = write!(corpus.text, " {index}");
            } else {
                let value = f32::from(rng.gen_range(1_u8..=64)) / 4.0;
                corpus.values.push(value);
                let _ = write!(corpus.text, " {index}:{value}");
            }
            corpus.column_indices.push(index);
        }
        corpus.text.push('\n');
        corpus.row_offsets.push(corpus.column_indices.len());
    }
    corpus
}
