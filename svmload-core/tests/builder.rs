#![expect(clippy::expect_used, reason = "tests require contextual panics")]

mod common;

use std::sync::{Arc, Mutex};

use common::{Row, source};
use rstest::{fixture, rstest};
use svmload_core::{
    BatchSource, BatchSourceError, BuildError, CsrBuilder, InMemorySource, NullSink, RecordBatch,
    RowField,
};
use svmload_test_support::tracing::RecordingLayer;
use tracing_subscriber::layer::SubscriberExt;

#[fixture]
fn two_rows() -> Vec<Row> {
    vec![
        Row::new(1.0, &[(0, 0.5), (2, 1.5)]),
        Row::new(0.0, &[(1, 2.0)]),
    ]
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(8)]
fn builds_csr_from_two_rows(two_rows: Vec<Row>, #[case] threads: usize) {
    let matrix = CsrBuilder::new()
        .with_threads(threads)
        .build(&mut source(&two_rows, 1))
        .expect("build must succeed");

    assert_eq!(matrix.num_rows(), 2);
    assert_eq!(matrix.num_cols(), 3);
    assert_eq!(matrix.nelem(), 3);
    assert_eq!(matrix.values(), &[0.5, 1.5, 2.0]);
    assert_eq!(matrix.column_indices(), &[0, 2, 1]);
    assert_eq!(matrix.row_offsets(), &[0, 2, 3]);
    assert_eq!(matrix.labels(), Some(&[1.0_f32, 0.0][..]));
    assert!(matrix.weights().is_none());
    assert!(matrix.query_ids().is_none());
}

#[rstest]
fn empty_source_yields_empty_matrix() {
    let matrix = CsrBuilder::new()
        .build(&mut InMemorySource::new("empty", Vec::new()))
        .expect("empty input is valid");
    assert_eq!(matrix.num_rows(), 0);
    assert_eq!(matrix.num_cols(), 0);
    assert_eq!(matrix.nelem(), 0);
    assert_eq!(matrix.row_offsets(), &[0]);
    assert!(matrix.labels().is_none());
}

#[rstest]
fn rows_without_features_have_zero_columns() {
    let rows = vec![Row::new(1.0, &[]), Row::new(-1.0, &[])];
    let matrix = CsrBuilder::new()
        .build(&mut source(&rows, 4))
        .expect("featureless rows are valid");
    assert_eq!(matrix.num_rows(), 2);
    assert_eq!(matrix.num_cols(), 0);
    assert_eq!(matrix.row_offsets(), &[0, 0, 0]);
}

#[rstest]
fn absent_values_are_ones() {
    let batch = RecordBatch::try_new(vec![0, 2, 3], vec![4, 1, 7])
        .and_then(|b| b.with_labels(vec![1.0, 1.0]))
        .expect("batch layout");
    let matrix = CsrBuilder::new()
        .with_threads(2)
        .build(&mut InMemorySource::new("bare", vec![batch]))
        .expect("build must succeed");
    assert_eq!(matrix.values(), &[1.0, 1.0, 1.0]);
    assert_eq!(matrix.num_cols(), 8);
}

#[rstest]
fn offsets_are_rebased_per_batch() {
    let first = RecordBatch::try_new(vec![10, 12], vec![0, 1]).expect("first batch");
    let second = RecordBatch::try_new(vec![40, 41, 41], vec![5]).expect("second batch");
    let matrix = CsrBuilder::new()
        .build(&mut InMemorySource::new("offsets", vec![first, second]))
        .expect("build must succeed");
    assert_eq!(matrix.row_offsets(), &[0, 2, 3, 3]);
    assert_eq!(matrix.nelem(), 3);
}

#[rstest]
fn labels_must_cover_every_row() {
    let batch = RecordBatch::try_new(vec![0, 1, 2, 3], vec![0, 1, 2])
        .and_then(|b| b.with_labels(vec![1.0, 0.0]))
        .expect("batch layout");
    let err = CsrBuilder::new()
        .build(&mut InMemorySource::new("short", vec![batch]))
        .expect_err("two labels for three rows");
    assert_eq!(
        err,
        BuildError::DimensionMismatch {
            field: RowField::Label,
            count: 2,
            rows: 3,
        }
    );
    assert_eq!(err.to_string(), "label count 2 != row count 3");
}

#[rstest]
fn partial_weights_are_rejected() {
    let weighted = RecordBatch::try_new(vec![0, 1], vec![0])
        .and_then(|b| b.with_labels(vec![1.0]))
        .and_then(|b| b.with_weights(vec![0.5]))
        .expect("weighted batch");
    let unweighted = RecordBatch::try_new(vec![1, 2], vec![1])
        .and_then(|b| b.with_labels(vec![1.0]))
        .expect("unweighted batch");
    let err = CsrBuilder::new()
        .build(&mut InMemorySource::new("mixed", vec![weighted, unweighted]))
        .expect_err("one weight for two rows");
    assert!(matches!(
        err,
        BuildError::DimensionMismatch {
            field: RowField::Weight,
            count: 1,
            rows: 2,
        }
    ));
}

#[rstest]
fn weights_and_query_ids_are_kept() {
    let batch = RecordBatch::try_new(vec![0, 1, 2], vec![3, 3])
        .and_then(|b| b.with_labels(vec![1.0, -1.0]))
        .and_then(|b| b.with_weights(vec![2.0, 0.5]))
        .and_then(|b| b.with_query_ids(vec![1, 2]))
        .expect("batch layout");
    let matrix = CsrBuilder::new()
        .build(&mut InMemorySource::new("ranked", vec![batch]))
        .expect("build must succeed");
    assert_eq!(matrix.weights(), Some(&[2.0_f32, 0.5][..]));
    assert_eq!(matrix.query_ids(), Some(&[1_u64, 2][..]));
}

struct Failing {
    served: bool,
}

impl BatchSource for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError> {
        if self.served {
            return Err(BatchSourceError::Parse {
                line: 7,
                reason: Arc::from("bad token `x`"),
            });
        }
        self.served = true;
        RecordBatch::try_new(vec![0, 1], vec![0]).map(Some)
    }
}

#[rstest]
fn source_failures_stop_the_build() {
    let err = CsrBuilder::new()
        .build(&mut Failing { served: false })
        .expect_err("second batch fails");
    match err {
        BuildError::Source { source_name, error } => {
            assert_eq!(&*source_name, "failing");
            assert!(matches!(error, BatchSourceError::Parse { line: 7, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
fn verbose_progress_reports_running_row_count(two_rows: Vec<Row>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        move |message: &str| seen.lock().expect("lock").push(message.to_owned())
    };
    CsrBuilder::new()
        .with_verbose(true)
        .with_progress_sink(Arc::new(sink))
        .build(&mut source(&two_rows, 1))
        .expect("build must succeed");
    assert_eq!(
        *seen.lock().expect("lock"),
        vec!["1 rows read into memory", "2 rows read into memory"]
    );
}

#[rstest]
fn quiet_builds_send_no_progress(two_rows: Vec<Row>) {
    let seen = Arc::new(Mutex::new(0_usize));
    let sink = {
        let seen = Arc::clone(&seen);
        move |_: &str| *seen.lock().expect("lock") += 1
    };
    CsrBuilder::new()
        .with_progress_sink(Arc::new(sink))
        .build(&mut source(&two_rows, 1))
        .expect("build must succeed");
    assert_eq!(*seen.lock().expect("lock"), 0);
}

#[rstest]
fn default_sink_logs_progress_through_tracing(two_rows: Vec<Row>) {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    tracing::subscriber::with_default(subscriber, || {
        CsrBuilder::new()
            .with_verbose(true)
            .with_threads(1)
            .build(&mut source(&two_rows, 2))
    })
    .expect("build must succeed");

    assert_eq!(
        layer.messages_for("svmload::progress"),
        vec!["2 rows read into memory".to_owned()]
    );
    let span = layer.span("core.build").expect("core.build span must exist");
    assert_eq!(span.field("batch_source"), Some("rows"));
    assert_eq!(span.field("workers"), Some("1"));
}

#[rstest]
fn null_sink_silences_verbose_builds(two_rows: Vec<Row>) {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    tracing::subscriber::with_default(subscriber, || {
        CsrBuilder::new()
            .with_verbose(true)
            .with_progress_sink(Arc::new(NullSink))
            .build(&mut source(&two_rows, 1))
    })
    .expect("build must succeed");
    assert!(layer.messages_for("svmload::progress").is_empty());
}

#[rstest]
fn failed_builds_record_error_on_span() {
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let _ = tracing::subscriber::with_default(subscriber, || {
        CsrBuilder::new().build(&mut Failing { served: false })
    })
    .expect_err("source fails");
    let errors: Vec<_> = layer
        .events()
        .into_iter()
        .filter(|event| event.level == tracing::Level::ERROR)
        .collect();
    assert_eq!(errors.len(), 1);
}
