//! CSR matrix builder.
//!
//! Drains a [`BatchSource`], appending each batch with the parallel
//! assembler, then derives the column count and validates the per-row
//! sequences before sealing the [`SparseMatrix`].

use std::{fmt, num::NonZeroUsize, sync::Arc};

use tracing::{debug, info, instrument};

use crate::{
    Result,
    assembler::{BatchAssembler, ColumnSpan, CsrBuffers, rebase_to_zero},
    batch::BatchSource,
    error::{BuildError, RowField},
    matrix::{MatrixParts, SparseMatrix},
    progress::{ProgressSink, TracingSink},
    threads::{WorkerPool, max_threads, resolve_thread_count},
};

/// How feature indices in the source map to matrix columns.
///
/// # Examples
/// ```
/// use svmload_core::IndexBase;
///
/// assert_eq!(IndexBase::default(), IndexBase::Zero);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum IndexBase {
    /// Indices are column numbers as written.
    #[default]
    Zero,
    /// Indices start at one; every index is shifted down and `0` is rejected.
    One,
    /// Shift down by one only when no index `0` appears anywhere in the input.
    Auto,
}

/// Configures and runs the construction of a [`SparseMatrix`].
///
/// # Examples
/// ```
/// use svmload_core::{CsrBuilder, IndexBase};
///
/// let builder = CsrBuilder::new()
///     .with_threads(2)
///     .with_verbose(true)
///     .with_index_base(IndexBase::One);
/// assert_eq!(builder.threads(), 2);
/// assert!(builder.verbose());
/// assert_eq!(builder.index_base(), IndexBase::One);
/// ```
#[derive(Clone)]
pub struct CsrBuilder {
    threads: usize,
    verbose: bool,
    index_base: IndexBase,
    sink: Arc<dyn ProgressSink>,
}

impl Default for CsrBuilder {
    fn default() -> Self {
        Self {
            threads: 0,
            verbose: false,
            index_base: IndexBase::Zero,
            sink: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for CsrBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrBuilder")
            .field("threads", &self.threads)
            .field("verbose", &self.verbose)
            .field("index_base", &self.index_base)
            .finish_non_exhaustive()
    }
}

impl CsrBuilder {
    /// Creates a builder that uses every available core, stays quiet and
    /// keeps indices as written.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of workers; `0` means use every available core.
    ///
    /// Requests above the machine's parallelism are clamped.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Emits `"<n> rows read into memory"` after every batch when enabled.
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

    /// Routes verbose progress messages to `sink` instead of `tracing`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use svmload_core::{CsrBuilder, InMemorySource, RecordBatch};
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = {
    ///     let seen = Arc::clone(&seen);
    ///     move |message: &str| seen.lock().expect("lock").push(message.to_owned())
    /// };
    /// let batch = RecordBatch::try_new(vec![0, 1], vec![3])?.with_labels(vec![1.0])?;
    /// CsrBuilder::new()
    ///     .with_verbose(true)
    ///     .with_progress_sink(Arc::new(sink))
    ///     .build(&mut InMemorySource::new("demo", vec![batch]))?;
    /// assert_eq!(*seen.lock().expect("lock"), vec!["1 rows read into memory"]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Requested worker count, `0` meaning "all cores".
    #[must_use]
    #[rustfmt::skip]
    pub fn threads(&self) -> usize { self.threads }

    /// Whether progress messages are emitted.
    #[must_use]
    #[rustfmt::skip]
    pub fn verbose(&self) -> bool { self.verbose }

    /// Configured index base.
    #[must_use]
    #[rustfmt::skip]
    pub fn index_base(&self) -> IndexBase { self.index_base }

    /// Worker count a build would use on this machine.
    #[must_use]
    pub fn resolved_threads(&self) -> NonZeroUsize {
        resolve_thread_count(self.threads, max_threads())
    }

    /// Drains `source` and assembles the matrix.
    ///
    /// The result is identical for every worker count.
    ///
    /// # Errors
    /// - [`BuildError::Source`] when the source fails; assembly stops at once.
    /// - [`BuildError::DimensionMismatch`] when labels, weights or query ids
    ///   are present but do not cover every row.
    /// - [`BuildError::InvalidIndex`] when [`IndexBase::One`] meets index `0`.
    /// - [`BuildError::ThreadPool`] when the workers cannot be started.
    ///
    /// # Examples
    /// ```
    /// use svmload_core::{BuildError, CsrBuilder, InMemorySource, RecordBatch};
    ///
    /// let batch = RecordBatch::try_new(vec![0, 1, 2], vec![0, 1])?.with_labels(vec![1.0])?;
    /// let err = CsrBuilder::new()
    ///     .build(&mut InMemorySource::new("short", vec![batch]))
    ///     .expect_err("one label for two rows");
    /// assert!(matches!(err, BuildError::DimensionMismatch { count: 1, rows: 2, .. }));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn build<S>(&self, source: &mut S) -> Result<SparseMatrix>
    where
        S: BatchSource + ?Sized,
    {
        let workers = self.resolved_threads();
        self.build_with_workers(source, workers)
    }

    #[instrument(
        name = "core.build",
        err,
        skip(self, source),
        fields(
            batch_source = %source.name(),
            workers = workers.get(),
            index_base = ?self.index_base
        ),
    )]
    fn build_with_workers<S>(&self, source: &mut S, workers: NonZeroUsize) -> Result<SparseMatrix>
    where
        S: BatchSource + ?Sized,
    {
        let pool = WorkerPool::new(workers)?;
        let assembler = BatchAssembler::new(workers);
        let mut buffers = CsrBuffers::new();
        let mut worker_spans: Vec<Option<ColumnSpan>> = vec![None; workers.get()];
        let mut batches = 0_usize;

        while let Some(batch) = source
            .next_batch()
            .map_err(|error| BuildError::Source {
                source_name: Arc::from(source.name()),
                error,
            })?
        {
            let spans = pool.run(|| assembler.append(&mut buffers, &batch));
            for (seen, span) in worker_spans.iter_mut().zip(spans) {
                *seen = ColumnSpan::merge(*seen, span);
            }
            batches += 1;
            debug!(
                batch = batches,
                rows = batch.size(),
                pairs = batch.nnz(),
                total_rows = buffers.num_rows(),
                "batch appended"
            );
            if self.verbose {
                self.sink
                    .progress(&format!("{} rows read into memory", buffers.num_rows()));
            }
        }

        let span = worker_spans.into_iter().fold(None, ColumnSpan::merge);
        let span = self.apply_index_base(&pool, &mut buffers, span)?;
        let num_cols = span.map_or(0, |span| span.max as usize + 1);

        let rows = buffers.num_rows();
        check_row_field(RowField::Label, buffers.labels.len(), rows)?;
        check_row_field(RowField::Weight, buffers.weights.len(), rows)?;
        check_row_field(RowField::QueryId, buffers.query_ids.len(), rows)?;

        info!(
            batches,
            rows,
            cols = num_cols,
            nelem = buffers.nelem(),
            "matrix assembled"
        );
        Ok(SparseMatrix::from_parts(MatrixParts {
            values: buffers.values,
            column_indices: buffers.column_indices,
            row_offsets: buffers.row_offsets,
            labels: buffers.labels,
            weights: buffers.weights,
            query_ids: buffers.query_ids,
            num_cols,
        }))
    }

    fn apply_index_base(
        &self,
        pool: &WorkerPool,
        buffers: &mut CsrBuffers,
        span: Option<ColumnSpan>,
    ) -> Result<Option<ColumnSpan>> {
        let Some(span) = span else {
            return Ok(None);
        };
        let shift = match self.index_base {
            IndexBase::Zero => false,
            IndexBase::One if span.min == 0 => {
                return Err(BuildError::InvalidIndex { index: span.min });
            }
            IndexBase::One => true,
            IndexBase::Auto => span.min >= 1,
        };
        if !shift {
            return Ok(Some(span));
        }
        debug!(min = span.min, max = span.max, "shifting one-based indices");
        pool.run(|| rebase_to_zero(&mut buffers.column_indices));
        Ok(Some(ColumnSpan {
            min: span.min - 1,
            max: span.max - 1,
        }))
    }
}

/// Present-but-incomplete per-row sequences are errors; absent ones are not.
fn check_row_field(field: RowField, count: usize, rows: usize) -> Result<()> {
    if count == 0 || count == rows {
        return Ok(());
    }
    Err(BuildError::DimensionMismatch { field, count, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{InMemorySource, RecordBatch};
    use proptest::{collection::vec, prelude::*};
    use rstest::rstest;

    fn source(batches: Vec<RecordBatch>) -> InMemorySource {
        InMemorySource::new("unit", batches)
    }

    fn unlabelled(offsets: Vec<usize>, indices: Vec<u32>) -> RecordBatch {
        RecordBatch::try_new(offsets, indices).expect("test batch layout")
    }

    #[rstest]
    #[case(0, 0, Ok(()))]
    #[case(3, 3, Ok(()))]
    #[case(2, 3, Err(BuildError::DimensionMismatch { field: RowField::Weight, count: 2, rows: 3 }))]
    fn row_fields_must_cover_every_row(
        #[case] count: usize,
        #[case] rows: usize,
        #[case] expected: Result<()>,
    ) {
        assert_eq!(check_row_field(RowField::Weight, count, rows), expected);
    }

    #[rstest]
    #[case(IndexBase::Zero, vec![1, 3], 4)]
    #[case(IndexBase::One, vec![0, 2], 3)]
    #[case(IndexBase::Auto, vec![0, 2], 3)]
    fn index_base_controls_columns(
        #[case] base: IndexBase,
        #[case] indices: Vec<u32>,
        #[case] cols: usize,
    ) {
        let matrix = CsrBuilder::new()
            .with_threads(2)
            .with_index_base(base)
            .build(&mut source(vec![unlabelled(vec![0, 1, 2], vec![1, 3])]))
            .expect("build must succeed");
        assert_eq!(matrix.column_indices(), indices.as_slice());
        assert_eq!(matrix.num_cols(), cols);
    }

    #[rstest]
    fn auto_keeps_indices_when_zero_appears() {
        let matrix = CsrBuilder::new()
            .with_index_base(IndexBase::Auto)
            .build(&mut source(vec![
                unlabelled(vec![0, 1], vec![4]),
                unlabelled(vec![1, 2], vec![0]),
            ]))
            .expect("build must succeed");
        assert_eq!(matrix.column_indices(), &[4, 0]);
        assert_eq!(matrix.num_cols(), 5);
    }

    #[rstest]
    fn one_based_rejects_zero_index() {
        let err = CsrBuilder::new()
            .with_index_base(IndexBase::One)
            .build(&mut source(vec![unlabelled(vec![0, 2], vec![2, 0])]))
            .expect_err("index 0 is invalid when one-based");
        assert_eq!(err, BuildError::InvalidIndex { index: 0 });
    }

    #[rstest]
    fn debug_omits_sink() {
        let rendered = format!("{:?}", CsrBuilder::new().with_threads(3));
        assert!(rendered.contains("threads: 3"));
        assert!(rendered.ends_with(".. }"));
    }

    fn workers(count: usize) -> NonZeroUsize {
        NonZeroUsize::new(count).expect("test worker counts are non-zero")
    }

    /// Cuts generated rows into batches of `per_batch` rows with global offsets.
    fn batches(rows: &[Vec<(u32, Option<f32>)>], per_batch: usize) -> Vec<RecordBatch> {
        let mut next = 0;
        rows.chunks(per_batch)
            .map(|chunk| {
                let mut offsets = vec![next];
                let mut indices = Vec::new();
                let mut values = Vec::new();
                for row in chunk {
                    for &(index, value) in row {
                        indices.push(index);
                        values.push(value.unwrap_or(1.0));
                    }
                    next += row.len();
                    offsets.push(next);
                }
                let explicit = chunk.iter().flatten().any(|(_, value)| value.is_some());
                let batch = unlabelled(offsets, indices);
                if explicit {
                    batch.with_values(values).expect("values align with indices")
                } else {
                    batch
                }
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        // Worker counts bypass the machine clamp so every case really splits
        // the work, even on a single-core host.
        #[test]
        fn partitioning_never_changes_the_matrix(
            rows in vec(
                vec((0_u32..500, proptest::option::of(-32_i16..32)), 0..12),
                0..40,
            ),
            per_batch in 1_usize..12,
            base in prop_oneof![Just(IndexBase::Zero), Just(IndexBase::Auto)],
        ) {
            let rows: Vec<Vec<(u32, Option<f32>)>> = rows
                .into_iter()
                .map(|row| row.into_iter().map(|(i, v)| (i, v.map(f32::from))).collect())
                .collect();
            let builder = CsrBuilder::new().with_index_base(base);
            let build = |count: usize| {
                builder
                    .build_with_workers(&mut source(batches(&rows, per_batch)), workers(count))
                    .expect("generated batches must build")
            };
            let single = build(1);
            for count in [2, 3, 8] {
                prop_assert_eq!(&build(count), &single, "workers = {}", count);
            }
        }
    }

    #[rstest]
    fn eight_workers_on_a_small_batch_match_one() {
        let rows = vec![vec![(4, Some(0.5)), (1, None)], vec![], vec![(9, Some(2.0))]];
        let build = |count| {
            CsrBuilder::new()
                .build_with_workers(&mut source(batches(&rows, 2)), workers(count))
                .expect("build must succeed")
        };
        let single = build(1);
        assert_eq!(single.values(), &[0.5, 1.0, 2.0]);
        assert_eq!(single.row_offsets(), &[0, 2, 2, 3]);
        assert_eq!(build(8), single);
    }

    #[rstest]
    fn resolved_threads_honours_cap() {
        assert_eq!(CsrBuilder::new().with_threads(1).resolved_threads().get(), 1);
    }
}
