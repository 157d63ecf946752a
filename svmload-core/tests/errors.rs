use std::sync::Arc;

use rstest::rstest;
use svmload_core::{BatchSourceError, BatchSourceErrorCode, BuildError, BuildErrorCode, RowField};

#[rstest]
#[case(
    BatchSourceError::Parse { line: 3, reason: Arc::from("bad") },
    BatchSourceErrorCode::Parse,
    "BATCH_SOURCE_PARSE",
)]
#[case(
    BatchSourceError::Resource { name: Arc::from("a.svm"), reason: Arc::from("missing") },
    BatchSourceErrorCode::Resource,
    "BATCH_SOURCE_RESOURCE",
)]
#[case(
    BatchSourceError::MalformedBatch { reason: Arc::from("empty offsets") },
    BatchSourceErrorCode::MalformedBatch,
    "BATCH_SOURCE_MALFORMED_BATCH",
)]
fn returns_expected_batch_source_code(
    #[case] error: BatchSourceError,
    #[case] expected: BatchSourceErrorCode,
    #[case] rendered: &str,
) {
    assert_eq!(error.code(), expected);
    assert_eq!(error.code().as_str(), rendered);
    assert_eq!(expected.to_string(), rendered);
}

#[rstest]
#[case(
    BuildError::DimensionMismatch { field: RowField::QueryId, count: 1, rows: 2 },
    BuildErrorCode::DimensionMismatch,
    None,
)]
#[case(BuildError::InvalidIndex { index: 0 }, BuildErrorCode::InvalidIndex, None)]
#[case(
    BuildError::ThreadPool { threads: 4, reason: Arc::from("spawn failed") },
    BuildErrorCode::ThreadPool,
    None,
)]
#[case(
    BuildError::Source {
        source_name: Arc::from("input"),
        error: BatchSourceError::Parse { line: 1, reason: Arc::from("bad") },
    },
    BuildErrorCode::SourceFailure,
    Some(BatchSourceErrorCode::Parse),
)]
fn returns_expected_build_code(
    #[case] error: BuildError,
    #[case] expected: BuildErrorCode,
    #[case] source_code: Option<BatchSourceErrorCode>,
) {
    assert_eq!(error.code(), expected);
    assert_eq!(error.source_code(), source_code);
}

#[rstest]
#[case(RowField::Label, "label count 4 != row count 5")]
#[case(RowField::Weight, "weight count 4 != row count 5")]
#[case(RowField::QueryId, "qid count 4 != row count 5")]
fn dimension_mismatch_names_the_field(#[case] field: RowField, #[case] message: &str) {
    let error = BuildError::DimensionMismatch { field, count: 4, rows: 5 };
    assert_eq!(error.to_string(), message);
}

#[rstest]
fn source_errors_keep_their_cause() {
    use std::error::Error as _;

    let error = BuildError::Source {
        source_name: Arc::from("input"),
        error: BatchSourceError::Parse { line: 9, reason: Arc::from("bad index `x`") },
    };
    assert_eq!(error.to_string(), "batch source `input` failed: parse error on line 9: bad index `x`");
    let cause = error.source().expect("source error is chained");
    assert_eq!(cause.to_string(), "parse error on line 9: bad index `x`");
}
