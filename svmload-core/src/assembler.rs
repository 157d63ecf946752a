//! Parallel batch assembler.
//!
//! Appends one [`RecordBatch`] to the growing CSR buffers. The pair range of
//! the batch is cut into one contiguous chunk per worker; each worker copies
//! its chunk into the matching destination chunk and reports the span of
//! column indices it saw. Destination slot `k` of the batch always receives
//! source pair `k`, so the output is identical for every worker count.
//!
//! Without the `parallel` feature the same partition is walked on the calling
//! thread.

use std::num::NonZeroUsize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::batch::RecordBatch;

/// Smallest and largest column index seen by one worker.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ColumnSpan {
    /// Smallest column index seen.
    pub min: u32,
    /// Largest column index seen.
    pub max: u32,
}

impl ColumnSpan {
    /// Span covering a single index.
    #[must_use]
    pub const fn of(index: u32) -> Self {
        Self {
            min: index,
            max: index,
        }
    }

    /// Widens the span to cover `index`.
    #[must_use]
    pub fn include(self, index: u32) -> Self {
        Self {
            min: self.min.min(index),
            max: self.max.max(index),
        }
    }

    /// Smallest span covering both inputs; `None` stands for "nothing seen".
    #[must_use]
    pub fn merge(left: Option<Self>, right: Option<Self>) -> Option<Self> {
        match (left, right) {
            (Some(a), Some(b)) => Some(Self {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
            }),
            (span, None) | (None, span) => span,
        }
    }
}

/// The growing arrays of a matrix under construction.
#[derive(Debug)]
pub(crate) struct CsrBuffers {
    pub(crate) values: Vec<f32>,
    pub(crate) column_indices: Vec<u32>,
    pub(crate) row_offsets: Vec<usize>,
    pub(crate) labels: Vec<f32>,
    pub(crate) weights: Vec<f32>,
    pub(crate) query_ids: Vec<u64>,
}

impl CsrBuffers {
    pub(crate) fn new() -> Self {
        Self {
            values: Vec::new(),
            column_indices: Vec::new(),
            row_offsets: vec![0],
            labels: Vec::new(),
            weights: Vec::new(),
            query_ids: Vec::new(),
        }
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.row_offsets.len().saturating_sub(1)
    }

    pub(crate) fn nelem(&self) -> usize {
        self.values.len()
    }
}

/// Source pairs handed to one worker.
struct PairChunk<'a> {
    indices: &'a [u32],
    values: Option<&'a [f32]>,
}

impl PairChunk<'_> {
    /// Copies the chunk into its destination slots, returning the column span.
    fn scatter(&self, dst_values: &mut [f32], dst_indices: &mut [u32]) -> Option<ColumnSpan> {
        let mut source_values = self.values.map(<[f32]>::iter);
        let mut span: Option<ColumnSpan> = None;
        for ((value_slot, index_slot), &index) in dst_values
            .iter_mut()
            .zip(dst_indices.iter_mut())
            .zip(self.indices)
        {
            *value_slot = source_values
                .as_mut()
                .and_then(Iterator::next)
                .copied()
                .unwrap_or(1.0);
            *index_slot = index;
            span = Some(span.map_or(ColumnSpan::of(index), |seen| seen.include(index)));
        }
        span
    }
}

/// Appends batches to [`CsrBuffers`] with a fixed number of workers.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BatchAssembler {
    workers: NonZeroUsize,
}

impl BatchAssembler {
    pub(crate) const fn new(workers: NonZeroUsize) -> Self {
        Self { workers }
    }

    /// Length of each worker's contiguous share of `len` items.
    fn chunk_len(&self, len: usize) -> usize {
        len.div_ceil(self.workers.get()).max(1)
    }

    /// Appends `batch` to `buffers` and returns the column span of each worker
    /// that received pairs, in worker order.
    ///
    /// Must run inside the build's worker pool when the `parallel` feature is
    /// enabled.
    pub(crate) fn append(
        &self,
        buffers: &mut CsrBuffers,
        batch: &RecordBatch,
    ) -> Vec<Option<ColumnSpan>> {
        if let Some(labels) = batch.labels() {
            buffers.labels.extend_from_slice(labels);
        }
        if let Some(weights) = batch.weights() {
            buffers.weights.extend_from_slice(weights);
        }
        if let Some(query_ids) = batch.query_ids() {
            buffers.query_ids.extend_from_slice(query_ids);
        }

        let spans = self.append_pairs(buffers, batch);
        self.append_row_offsets(buffers, batch);
        spans
    }

    fn append_pairs(&self, buffers: &mut CsrBuffers, batch: &RecordBatch) -> Vec<Option<ColumnSpan>> {
        let pairs = batch.nnz();
        let top = buffers.values.len();
        buffers.values.resize(top + pairs, 0.0);
        buffers.column_indices.resize(top + pairs, 0);
        if pairs == 0 {
            return Vec::new();
        }

        let chunk = self.chunk_len(pairs);
        let sources: Vec<PairChunk<'_>> = match batch.values() {
            Some(values) => batch
                .indices()
                .chunks(chunk)
                .zip(values.chunks(chunk))
                .map(|(indices, values)| PairChunk {
                    indices,
                    values: Some(values),
                })
                .collect(),
            None => batch
                .indices()
                .chunks(chunk)
                .map(|indices| PairChunk {
                    indices,
                    values: None,
                })
                .collect(),
        };
        let (_, dst_values) = buffers.values.split_at_mut(top);
        let (_, dst_indices) = buffers.column_indices.split_at_mut(top);
        scatter_chunks(&sources, dst_values, dst_indices, chunk)
    }

    fn append_row_offsets(&self, buffers: &mut CsrBuffers, batch: &RecordBatch) {
        let rows = batch.size();
        let rtop = buffers.row_offsets.len();
        let previous_last = buffers.row_offsets.last().copied().unwrap_or(0);
        let base = batch.base_offset();
        buffers.row_offsets.resize(rtop + rows, previous_last);
        if rows == 0 {
            return;
        }

        let chunk = self.chunk_len(rows);
        let ends = batch.offsets().get(1..).unwrap_or_default();
        let (_, dst) = buffers.row_offsets.split_at_mut(rtop);
        let fill = |(slots, ends): (&mut [usize], &[usize])| {
            for (slot, &end) in slots.iter_mut().zip(ends) {
                *slot = previous_last + (end - base);
            }
        };

        #[cfg(feature = "parallel")]
        dst.par_chunks_mut(chunk)
            .zip(ends.par_chunks(chunk))
            .for_each(fill);
        #[cfg(not(feature = "parallel"))]
        dst.chunks_mut(chunk).zip(ends.chunks(chunk)).for_each(fill);
    }
}

#[cfg(feature = "parallel")]
fn scatter_chunks(
    sources: &[PairChunk<'_>],
    dst_values: &mut [f32],
    dst_indices: &mut [u32],
    chunk: usize,
) -> Vec<Option<ColumnSpan>> {
    dst_values
        .par_chunks_mut(chunk)
        .zip(dst_indices.par_chunks_mut(chunk))
        .zip(sources.par_iter())
        .map(|((values, indices), source)| source.scatter(values, indices))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn scatter_chunks(
    sources: &[PairChunk<'_>],
    dst_values: &mut [f32],
    dst_indices: &mut [u32],
    chunk: usize,
) -> Vec<Option<ColumnSpan>> {
    dst_values
        .chunks_mut(chunk)
        .zip(dst_indices.chunks_mut(chunk))
        .zip(sources)
        .map(|((values, indices), source)| source.scatter(values, indices))
        .collect()
}

/// Shifts every index down by one, turning one-based indices zero-based.
///
/// Callers guarantee no index is zero.
pub(crate) fn rebase_to_zero(indices: &mut [u32]) {
    let shift = |index: &mut u32| *index = index.saturating_sub(1);
    #[cfg(feature = "parallel")]
    indices.par_iter_mut().for_each(shift);
    #[cfg(not(feature = "parallel"))]
    indices.iter_mut().for_each(shift);
}
