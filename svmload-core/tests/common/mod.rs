use svmload_core::{InMemorySource, RecordBatch};

/// One record before batching: a label and `(index, value)` pairs, where a
/// missing value stands for an implicit `1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub label: f32,
    pub pairs: Vec<(u32, Option<f32>)>,
}

impl Row {
    #[must_use]
    pub fn new(label: f32, pairs: &[(u32, f32)]) -> Self {
        Self {
            label,
            pairs: pairs.iter().map(|&(index, value)| (index, Some(value))).collect(),
        }
    }
}

/// Splits `rows` into labelled batches of at most `per_batch` rows with
/// global offsets. A batch carries values only if one of its pairs is explicit.
#[must_use]
pub fn into_batches(rows: &[Row], per_batch: usize) -> Vec<RecordBatch> {
    let mut next = 0;
    rows.chunks(per_batch.max(1))
        .map(|chunk| {
            let mut offsets = vec![next];
            let mut indices = Vec::new();
            let mut values = Vec::new();
            let mut explicit = false;
            for row in chunk {
                for &(index, value) in &row.pairs {
                    explicit |= value.is_some();
                    indices.push(index);
                    values.push(value.unwrap_or(1.0));
                }
                next += row.pairs.len();
                offsets.push(next);
            }
            let labels = chunk.iter().map(|row| row.label).collect();
            let batch = RecordBatch::try_new(offsets, indices)
                .and_then(|batch| batch.with_labels(labels))
                .expect("generated batch must be well formed");
            if explicit {
                batch.with_values(values).expect("values align with indices")
            } else {
                batch
            }
        })
        .collect()
}

#[must_use]
pub fn source(rows: &[Row], per_batch: usize) -> InMemorySource {
    InMemorySource::new("rows", into_batches(rows, per_batch))
}
