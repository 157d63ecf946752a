//! Record batches and the source abstraction that yields them.
//!
//! A [`RecordBatch`] is one chunk of already-tokenised rows: cumulative pair
//! offsets delimiting each row, the flattened feature indices and (optional)
//! feature values, and optional per-row labels, weights and query ids. Offsets
//! may start anywhere; sources usually continue them across batches so that
//! they are global to the whole input.

use std::{collections::VecDeque, sync::Arc};

use crate::error::BatchSourceError;

/// One chunk of parsed rows.
///
/// # Examples
/// ```
/// use svmload_core::RecordBatch;
///
/// let batch = RecordBatch::try_new(vec![4, 6, 7], vec![0, 2, 1])?
///     .with_values(vec![0.5, 1.5, 2.0])?
///     .with_labels(vec![1.0, 0.0])?;
/// assert_eq!(batch.size(), 2);
/// assert_eq!(batch.nnz(), 3);
/// assert_eq!(batch.base_offset(), 4);
/// # Ok::<(), svmload_core::BatchSourceError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RecordBatch {
    offsets: Vec<usize>,
    indices: Vec<u32>,
    values: Option<Vec<f32>>,
    labels: Option<Vec<f32>>,
    weights: Option<Vec<f32>>,
    query_ids: Option<Vec<u64>>,
}

impl RecordBatch {
    /// Creates a batch from row offsets and the flattened feature indices.
    ///
    /// `offsets` holds `size + 1` cumulative positions; row `r` owns pairs
    /// `offsets[r]..offsets[r + 1]`. Values default to absent, which the
    /// assembler reads as `1.0` for every pair.
    ///
    /// # Errors
    /// Returns [`BatchSourceError::MalformedBatch`] when `offsets` is empty or
    /// decreasing, or when `indices` does not hold exactly
    /// `offsets[size] - offsets[0]` entries.
    pub fn try_new(offsets: Vec<usize>, indices: Vec<u32>) -> Result<Self, BatchSourceError> {
        let (Some(&first), Some(&last)) = (offsets.first(), offsets.last()) else {
            return Err(malformed("offsets must contain at least one entry"));
        };
        if offsets.windows(2).any(|pair| matches!(pair, [a, b] if b < a)) {
            return Err(malformed("offsets must be non-decreasing"));
        }
        let pairs = last - first;
        if indices.len() != pairs {
            return Err(malformed(&format!(
                "offsets delimit {pairs} pairs but {} indices were supplied",
                indices.len()
            )));
        }
        Ok(Self {
            offsets,
            indices,
            values: None,
            labels: None,
            weights: None,
            query_ids: None,
        })
    }

    /// Attaches explicit feature values, one per index.
    ///
    /// # Errors
    /// Returns [`BatchSourceError::MalformedBatch`] when the lengths differ.
    pub fn with_values(mut self, values: Vec<f32>) -> Result<Self, BatchSourceError> {
        if values.len() != self.indices.len() {
            return Err(malformed(&format!(
                "{} values supplied for {} indices",
                values.len(),
                self.indices.len()
            )));
        }
        self.values = Some(values);
        Ok(self)
    }

    /// Attaches labels.
    ///
    /// Sources normally provide one label per row. Fewer are accepted here;
    /// the builder rejects totals that disagree with the row count.
    ///
    /// # Errors
    /// Returns [`BatchSourceError::MalformedBatch`] when more labels than rows
    /// are supplied.
    pub fn with_labels(mut self, labels: Vec<f32>) -> Result<Self, BatchSourceError> {
        self.labels = Some(self.check_per_row("labels", labels)?);
        Ok(self)
    }

    /// Attaches instance weights. Same length rules as [`Self::with_labels`].
    ///
    /// # Errors
    /// Returns [`BatchSourceError::MalformedBatch`] when more weights than rows
    /// are supplied.
    pub fn with_weights(mut self, weights: Vec<f32>) -> Result<Self, BatchSourceError> {
        self.weights = Some(self.check_per_row("weights", weights)?);
        Ok(self)
    }

    /// Attaches query identifiers. Same length rules as [`Self::with_labels`].
    ///
    /// # Errors
    /// Returns [`BatchSourceError::MalformedBatch`] when more query ids than
    /// rows are supplied.
    pub fn with_query_ids(mut self, query_ids: Vec<u64>) -> Result<Self, BatchSourceError> {
        self.query_ids = Some(self.check_per_row("query ids", query_ids)?);
        Ok(self)
    }

    fn check_per_row<T>(&self, what: &str, items: Vec<T>) -> Result<Vec<T>, BatchSourceError> {
        if items.len() > self.size() {
            return Err(malformed(&format!(
                "{} {what} supplied for {} rows",
                items.len(),
                self.size()
            )));
        }
        Ok(items)
    }

    /// Number of rows in the batch.
    #[must_use]
    pub fn size(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Returns `true` when the batch holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Cumulative pair offsets, `size + 1` entries.
    #[must_use]
    #[rustfmt::skip]
    pub fn offsets(&self) -> &[usize] { &self.offsets }

    /// First offset of the batch (`offsets[0]`).
    #[must_use]
    pub fn base_offset(&self) -> usize {
        self.offsets.first().copied().unwrap_or(0)
    }

    /// Number of (index, value) pairs in the batch.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Feature indices; entry `k` belongs to global pair `base_offset() + k`.
    #[must_use]
    #[rustfmt::skip]
    pub fn indices(&self) -> &[u32] { &self.indices }

    /// Explicit feature values, if the source provided any.
    #[must_use]
    pub fn values(&self) -> Option<&[f32]> {
        self.values.as_deref()
    }

    /// Labels, if present.
    #[must_use]
    pub fn labels(&self) -> Option<&[f32]> {
        self.labels.as_deref()
    }

    /// Instance weights, if present.
    #[must_use]
    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }

    /// Query identifiers, if present.
    #[must_use]
    pub fn query_ids(&self) -> Option<&[u64]> {
        self.query_ids.as_deref()
    }
}

fn malformed(reason: &str) -> BatchSourceError {
    BatchSourceError::MalformedBatch {
        reason: Arc::from(reason),
    }
}

/// Producer of [`RecordBatch`]es, read front to back exactly once.
///
/// # Examples
/// ```
/// use svmload_core::{BatchSource, BatchSourceError, RecordBatch};
///
/// struct Single(Option<RecordBatch>);
///
/// impl BatchSource for Single {
///     fn name(&self) -> &str { "single" }
///     fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError> {
///         Ok(self.0.take())
///     }
/// }
///
/// let mut source = Single(Some(RecordBatch::try_new(vec![0, 1], vec![3])?));
/// assert_eq!(source.name(), "single");
/// assert!(source.next_batch()?.is_some());
/// assert!(source.next_batch()?.is_none());
/// # Ok::<(), BatchSourceError>(())
/// ```
pub trait BatchSource {
    /// Returns a human-readable name.
    fn name(&self) -> &str;

    /// Yields the next batch, or `None` once the input is exhausted.
    ///
    /// # Errors
    /// Returns [`BatchSourceError`] when the input cannot be read or parsed.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError>;
}

impl<S: BatchSource + ?Sized> BatchSource for &mut S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError> {
        (**self).next_batch()
    }
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError> {
        (**self).next_batch()
    }
}

/// [`BatchSource`] over batches that are already in memory.
///
/// # Examples
/// ```
/// use svmload_core::{BatchSource, InMemorySource, RecordBatch};
///
/// let batch = RecordBatch::try_new(vec![0, 2], vec![1, 4])?;
/// let mut source = InMemorySource::new("memory", vec![batch]);
/// assert_eq!(source.remaining(), 1);
/// assert!(source.next_batch()?.is_some());
/// assert_eq!(source.remaining(), 0);
/// # Ok::<(), svmload_core::BatchSourceError>(())
/// ```
#[derive(Clone, Debug)]
pub struct InMemorySource {
    name: String,
    batches: VecDeque<RecordBatch>,
}

impl InMemorySource {
    /// Creates a source yielding `batches` in order.
    #[must_use]
    pub fn new(name: impl Into<String>, batches: Vec<RecordBatch>) -> Self {
        Self {
            name: name.into(),
            batches: batches.into(),
        }
    }

    /// Number of batches not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl BatchSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError> {
        Ok(self.batches.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty_offsets(vec![], vec![])]
    #[case::decreasing(vec![0, 3, 2], vec![1, 2])]
    #[case::too_few_indices(vec![0, 2, 3], vec![1, 2])]
    #[case::too_many_indices(vec![5, 6], vec![1, 2])]
    fn try_new_rejects_inconsistent_layouts(#[case] offsets: Vec<usize>, #[case] indices: Vec<u32>) {
        let err = RecordBatch::try_new(offsets, indices).expect_err("layout must be rejected");
        assert!(matches!(err, BatchSourceError::MalformedBatch { .. }));
    }

    #[rstest]
    fn offsets_need_not_start_at_zero() {
        let batch = RecordBatch::try_new(vec![10, 12, 12, 13], vec![0, 1, 2])
            .expect("layout is consistent");
        assert_eq!(batch.size(), 3);
        assert_eq!(batch.base_offset(), 10);
        assert_eq!(batch.nnz(), 3);
        assert!(batch.values().is_none());
    }

    #[rstest]
    fn single_offset_is_an_empty_batch() {
        let batch = RecordBatch::try_new(vec![7], vec![]).expect("empty batch is valid");
        assert!(batch.is_empty());
        assert_eq!(batch.nnz(), 0);
    }

    #[rstest]
    fn values_must_match_indices() {
        let batch = RecordBatch::try_new(vec![0, 2], vec![1, 2]).expect("layout is consistent");
        let err = batch
            .with_values(vec![1.0])
            .expect_err("short values must be rejected");
        assert!(matches!(err, BatchSourceError::MalformedBatch { .. }));
    }

    #[rstest]
    fn per_row_sequences_may_be_partial_but_not_oversized() {
        let batch = RecordBatch::try_new(vec![0, 1, 2], vec![1, 2]).expect("layout is consistent");
        let partial = batch
            .clone()
            .with_weights(vec![0.5])
            .expect("fewer weights than rows is accepted");
        assert_eq!(partial.weights(), Some(&[0.5_f32][..]));

        let err = batch
            .with_labels(vec![1.0, 0.0, 1.0])
            .expect_err("more labels than rows must be rejected");
        assert!(matches!(err, BatchSourceError::MalformedBatch { .. }));
    }

    fn drain<S: BatchSource>(mut source: S) -> Vec<RecordBatch> {
        let mut out = Vec::new();
        while let Some(batch) = source.next_batch().expect("in-memory reads cannot fail") {
            out.push(batch);
        }
        out
    }

    #[rstest]
    fn in_memory_source_yields_in_order() {
        let first = RecordBatch::try_new(vec![0, 1], vec![1]).expect("first batch");
        let second = RecordBatch::try_new(vec![1, 3], vec![2, 3]).expect("second batch");
        let mut source = InMemorySource::new("memory", vec![first.clone(), second.clone()]);
        assert_eq!((&mut source).name(), "memory");
        assert_eq!(drain(&mut source), vec![first, second]);
        assert_eq!(source.remaining(), 0);
    }
}
