//! Compressed sparse row matrix produced by [`crate::CsrBuilder`].
//!
//! The matrix is immutable once built. All arrays are exposed as read-only
//! slices so callers can hand them to numerical code without copying, and
//! [`SparseMatrix::into_parts`] releases ownership of the buffers outright.

/// Row, column and nonzero counts of a [`SparseMatrix`].
///
/// # Examples
/// ```
/// use svmload_core::Dimensions;
///
/// let dims = Dimensions { num_rows: 2, num_cols: 3, nelem: 3 };
/// assert_eq!(dims.to_string(), "2 x 3 (3 nonzero)");
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Dimensions {
    /// Number of rows (records).
    pub num_rows: usize,
    /// Number of columns, one past the largest column index.
    pub num_cols: usize,
    /// Number of stored (index, value) pairs.
    pub nelem: usize,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} x {} ({} nonzero)",
            self.num_rows, self.num_cols, self.nelem
        )
    }
}

/// Immutable CSR matrix with optional per-row labels, weights and query ids.
///
/// # Examples
/// ```
/// use svmload_core::{CsrBuilder, InMemorySource, RecordBatch};
///
/// let batch = RecordBatch::try_new(vec![0, 2, 3], vec![0, 2, 1])?
///     .with_values(vec![0.5, 1.5, 2.0])?
///     .with_labels(vec![1.0, 0.0])?;
/// let matrix = CsrBuilder::new()
///     .with_threads(1)
///     .build(&mut InMemorySource::new("demo", vec![batch]))?;
///
/// assert_eq!(matrix.num_rows(), 2);
/// assert_eq!(matrix.num_cols(), 3);
/// assert_eq!(matrix.row_offsets(), &[0, 2, 3]);
/// assert_eq!(matrix.labels(), Some(&[1.0_f32, 0.0][..]));
/// assert!(matrix.weights().is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    values: Vec<f32>,
    column_indices: Vec<u32>,
    row_offsets: Vec<usize>,
    labels: Vec<f32>,
    weights: Vec<f32>,
    query_ids: Vec<u64>,
    num_cols: usize,
}

/// Owned buffers of a [`SparseMatrix`], as returned by
/// [`SparseMatrix::into_parts`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatrixParts {
    /// Feature values in row-major order.
    pub values: Vec<f32>,
    /// Column index of each value.
    pub column_indices: Vec<u32>,
    /// Row start positions, `num_rows + 1` entries.
    pub row_offsets: Vec<usize>,
    /// One label per row, or empty.
    pub labels: Vec<f32>,
    /// One weight per row, or empty.
    pub weights: Vec<f32>,
    /// One query id per row, or empty.
    pub query_ids: Vec<u64>,
    /// Number of columns.
    pub num_cols: usize,
}

/// Borrowed view of one matrix row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SparseRow<'a> {
    /// Column indices of the row's entries, in source order.
    pub indices: &'a [u32],
    /// Values of the row's entries, aligned with `indices`.
    pub values: &'a [f32],
}

impl SparseRow<'_> {
    /// Number of stored entries in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` when the row has no stored entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl SparseMatrix {
    /// Assembles a matrix from buffers that already satisfy the CSR
    /// invariants. Only the builder constructs matrices.
    pub(crate) fn from_parts(parts: MatrixParts) -> Self {
        debug_assert_eq!(parts.values.len(), parts.column_indices.len());
        debug_assert_eq!(parts.row_offsets.first().copied(), Some(0));
        debug_assert_eq!(
            parts.row_offsets.last().copied(),
            Some(parts.values.len())
        );
        Self {
            values: parts.values,
            column_indices: parts.column_indices,
            row_offsets: parts.row_offsets,
            labels: parts.labels,
            weights: parts.weights,
            query_ids: parts.query_ids,
            num_cols: parts.num_cols,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_offsets.len().saturating_sub(1)
    }

    /// Number of columns: one past the largest column index, or zero when the
    /// matrix stores no entries.
    #[must_use]
    #[rustfmt::skip]
    pub fn num_cols(&self) -> usize { self.num_cols }

    /// Number of stored entries.
    #[must_use]
    pub fn nelem(&self) -> usize {
        self.values.len()
    }

    /// Returns all three counts at once.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            num_rows: self.num_rows(),
            num_cols: self.num_cols,
            nelem: self.nelem(),
        }
    }

    /// Feature values in row-major, then source, order.
    #[must_use]
    #[rustfmt::skip]
    pub fn values(&self) -> &[f32] { &self.values }

    /// Zero-based column index of each entry in [`Self::values`].
    #[must_use]
    #[rustfmt::skip]
    pub fn column_indices(&self) -> &[u32] { &self.column_indices }

    /// Start position of each row plus a trailing `nelem` sentinel.
    #[must_use]
    #[rustfmt::skip]
    pub fn row_offsets(&self) -> &[usize] { &self.row_offsets }

    /// Per-row labels, or `None` when the source carried none.
    #[must_use]
    pub fn labels(&self) -> Option<&[f32]> {
        non_empty(&self.labels)
    }

    /// Per-row weights, or `None` when the source carried none.
    #[must_use]
    pub fn weights(&self) -> Option<&[f32]> {
        non_empty(&self.weights)
    }

    /// Per-row query ids, or `None` when the source carried none.
    #[must_use]
    pub fn query_ids(&self) -> Option<&[u64]> {
        non_empty(&self.query_ids)
    }

    /// Returns row `index`, or `None` when out of bounds.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<SparseRow<'_>> {
        let start = *self.row_offsets.get(index)?;
        let end = *self.row_offsets.get(index.checked_add(1)?)?;
        Some(SparseRow {
            indices: self.column_indices.get(start..end)?,
            values: self.values.get(start..end)?,
        })
    }

    /// Iterates over all rows in order.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = SparseRow<'_>> + '_ {
        self.row_offsets.windows(2).map(|bounds| {
            let (start, end) = match bounds {
                [start, end] => (*start, *end),
                _ => (0, 0),
            };
            SparseRow {
                indices: self.column_indices.get(start..end).unwrap_or_default(),
                values: self.values.get(start..end).unwrap_or_default(),
            }
        })
    }

    /// Releases the underlying buffers.
    #[must_use]
    pub fn into_parts(self) -> MatrixParts {
        MatrixParts {
            values: self.values,
            column_indices: self.column_indices,
            row_offsets: self.row_offsets,
            labels: self.labels,
            weights: self.weights,
            query_ids: self.query_ids,
            num_cols: self.num_cols,
        }
    }
}

fn non_empty<T>(items: &[T]) -> Option<&[T]> {
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn matrix() -> SparseMatrix {
        SparseMatrix::from_parts(MatrixParts {
            values: vec![0.5, 1.5, 2.0],
            column_indices: vec![0, 2, 1],
            row_offsets: vec![0, 2, 2, 3],
            labels: vec![1.0, 0.0, 1.0],
            weights: Vec::new(),
            query_ids: Vec::new(),
            num_cols: 3,
        })
    }

    #[rstest]
    fn dimensions_follow_buffers(matrix: SparseMatrix) {
        assert_eq!(
            matrix.dimensions(),
            Dimensions {
                num_rows: 3,
                num_cols: 3,
                nelem: 3
            }
        );
    }

    #[rstest]
    fn absent_sequences_are_none(matrix: SparseMatrix) {
        assert!(matrix.labels().is_some());
        assert!(matrix.weights().is_none());
        assert!(matrix.query_ids().is_none());
    }

    #[rstest]
    #[case(0, &[0, 2], &[0.5, 1.5])]
    #[case(1, &[], &[])]
    #[case(2, &[1], &[2.0])]
    fn row_slices_entries(
        matrix: SparseMatrix,
        #[case] index: usize,
        #[case] indices: &[u32],
        #[case] values: &[f32],
    ) {
        let row = matrix.row(index).expect("row must exist");
        assert_eq!(row.indices, indices);
        assert_eq!(row.values, values);
        assert_eq!(row.is_empty(), indices.is_empty());
    }

    #[rstest]
    fn row_out_of_bounds_is_none(matrix: SparseMatrix) {
        assert!(matrix.row(3).is_none());
        assert!(matrix.row(usize::MAX).is_none());
    }

    #[rstest]
    fn rows_iterates_every_row(matrix: SparseMatrix) {
        let lengths: Vec<usize> = matrix.rows().map(|row| row.len()).collect();
        assert_eq!(lengths, vec![2, 0, 1]);
    }

    #[rstest]
    fn into_parts_round_trips(matrix: SparseMatrix) {
        let copy = matrix.clone();
        let parts = matrix.into_parts();
        assert_eq!(parts.row_offsets, vec![0, 2, 2, 3]);
        assert_eq!(SparseMatrix::from_parts(parts), copy);
    }
}
