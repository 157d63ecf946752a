//! Synthetic benchmark inputs.
//!
//! Corpora come from the seeded generator in `svmload-test-support`, so every
//! run measures the same bytes.

use std::io::Cursor;

use svmload_core::{BatchSource, BatchSourceError, RecordBatch};
use svmload_providers_text::{LibSvmOptions, LibSvmSource};
use svmload_test_support::corpus::{Corpus, CorpusShape, generate};

/// Seed shared by every benchmark corpus.
pub const SEED: u64 = 42;

/// Generates a corpus of `rows` records over 1 000 columns with up to 32
/// features each.
#[must_use]
pub fn corpus(rows: usize) -> Corpus {
    generate(&CorpusShape {
        rows,
        cols: 1_000,
        max_features: 32,
        weighted: false,
        query_ids: false,
        bare_ratio: 0.1,
        seed: SEED,
    })
}

/// Parses `text` once into batches of roughly `batch_bytes` bytes so that a
/// benchmark can time assembly alone.
///
/// # Errors
/// Returns [`BatchSourceError`] when the text does not parse.
pub fn pre_parse(text: &str, batch_bytes: usize) -> Result<Vec<RecordBatch>, BatchSourceError> {
    let options = LibSvmOptions::default().with_batch_bytes(batch_bytes);
    let mut source = LibSvmSource::from_reader("bench", Cursor::new(text.as_bytes()), options)
        .map_err(|err| err.into_batch_source_error("bench"))?;
    let mut batches = Vec::new();
    while let Some(batch) = source.next_batch()? {
        batches.push(batch);
    }
    Ok(batches)
}
