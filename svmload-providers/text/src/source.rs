use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use rayon::prelude::*;
use svmload_core::{BatchSource, BatchSourceError, RecordBatch, max_threads, resolve_thread_count};
use tracing::debug;

use crate::{
    errors::LibSvmError,
    parse::{ParsedLine, data_text, parse_line},
};

/// Default byte budget of one batch.
pub const DEFAULT_BATCH_BYTES: usize = 16 * 1024 * 1024;

/// Reader configuration for [`LibSvmSource`].
///
/// # Examples
/// ```
/// use svmload_providers_text::LibSvmOptions;
///
/// let options = LibSvmOptions::default().with_batch_bytes(4096).with_threads(2);
/// assert_eq!(options.batch_bytes(), 4096);
/// assert_eq!(options.threads(), 2);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LibSvmOptions {
    batch_bytes: usize,
    threads: usize,
}

impl Default for LibSvmOptions {
    fn default() -> Self {
        Self {
            batch_bytes: DEFAULT_BATCH_BYTES,
            threads: 0,
        }
    }
}

impl LibSvmOptions {
    /// Lines are gathered into a batch until it holds at least this many bytes.
    #[must_use]
    pub fn with_batch_bytes(mut self, batch_bytes: usize) -> Self {
        self.batch_bytes = batch_bytes;
        self
    }

    /// Caps the parser threads; `0` uses every available core.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Byte budget of one batch.
    #[must_use]
    #[rustfmt::skip]
    pub fn batch_bytes(&self) -> usize { self.batch_bytes }

    /// Requested parser threads, `0` meaning "all cores".
    #[must_use]
    #[rustfmt::skip]
    pub fn threads(&self) -> usize { self.threads }
}

/// Batch source over SVMLight/LibSVM text.
///
/// Each call to [`BatchSource::next_batch`] reads whole lines up to the byte
/// budget, tokenises them in parallel and returns one batch whose offsets
/// continue from the previous batch.
///
/// # Examples
/// ```
/// use std::io::Cursor;
/// use svmload_core::BatchSource;
/// use svmload_providers_text::{LibSvmOptions, LibSvmSource};
///
/// let text = "1 0:0.5 2:1.5\n0 1:2\n";
/// let mut source = LibSvmSource::from_reader("demo", Cursor::new(text), LibSvmOptions::default())?;
/// let batch = source.next_batch()?.expect("one batch");
/// assert_eq!(batch.offsets(), &[0, 2, 3]);
/// assert_eq!(batch.labels(), Some(&[1.0_f32, 0.0][..]));
/// assert!(source.next_batch()?.is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LibSvmSource<R> {
    name: String,
    reader: R,
    options: LibSvmOptions,
    pool: rayon::ThreadPool,
    line: u64,
    next_offset: usize,
    buffer: Vec<u8>,
}

impl LibSvmSource<BufReader<File>> {
    /// Opens the file at `path`.
    ///
    /// # Errors
    /// Returns [`LibSvmError::Io`] when the file cannot be opened and the
    /// errors of [`LibSvmSource::from_reader`].
    pub fn open(path: impl AsRef<Path>, options: LibSvmOptions) -> Result<Self, LibSvmError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(path.display().to_string(), BufReader::new(file), options)
    }
}

impl<R: BufRead> LibSvmSource<R> {
    /// Wraps an already-open reader.
    ///
    /// # Errors
    /// Returns [`LibSvmError::ZeroBatchBytes`] for a zero byte budget and
    /// [`LibSvmError::ThreadPool`] when the parser threads cannot start.
    pub fn from_reader(
        name: impl Into<String>,
        reader: R,
        options: LibSvmOptions,
    ) -> Result<Self, LibSvmError> {
        if options.batch_bytes == 0 {
            return Err(LibSvmError::ZeroBatchBytes);
        }
        let threads = resolve_thread_count(options.threads, max_threads()).get();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("svmload-parse-{index}"))
            .build()
            .map_err(|err| LibSvmError::ThreadPool {
                threads,
                reason: err.to_string(),
            })?;
        Ok(Self {
            name: name.into(),
            reader,
            options,
            pool,
            line: 0,
            next_offset: 0,
            buffer: Vec::new(),
        })
    }

    /// Options the source was opened with.
    #[must_use]
    #[rustfmt::skip]
    pub fn options(&self) -> LibSvmOptions { self.options }

    /// Number of physical lines consumed so far.
    #[must_use]
    #[rustfmt::skip]
    pub fn lines_read(&self) -> u64 { self.line }

    /// Reads whole raw lines until the byte budget is met or input ends.
    ///
    /// Lines stay bytes here; decoding happens per line during parsing so
    /// that comments may hold any encoding.
    fn read_lines(&mut self) -> Result<Vec<(u64, Vec<u8>)>, LibSvmError> {
        let mut lines = Vec::new();
        let mut bytes = 0;
        while bytes < self.options.batch_bytes {
            self.buffer.clear();
            let read = self.reader.read_until(b'\n', &mut self.buffer)?;
            if read == 0 {
                break;
            }
            self.line += 1;
            bytes += read;
            lines.push((self.line, std::mem::take(&mut self.buffer)));
        }
        Ok(lines)
    }

    fn parse_lines(&self, lines: &[(u64, Vec<u8>)]) -> Result<Vec<ParsedLine>, LibSvmError> {
        let parsed: Vec<Result<Option<ParsedLine>, LibSvmError>> = self.pool.install(|| {
            lines
                .par_iter()
                .map(|(line, raw)| data_text(raw, *line).and_then(|text| parse_line(text, *line)))
                .collect()
        });
        // First failure in line order.
        parsed
            .into_iter()
            .filter_map(Result::transpose)
            .collect()
    }

    fn next_records(&mut self) -> Result<Option<Vec<ParsedLine>>, LibSvmError> {
        loop {
            let lines = self.read_lines()?;
            if lines.is_empty() {
                return Ok(None);
            }
            let records = self.parse_lines(&lines)?;
            if !records.is_empty() {
                return Ok(Some(records));
            }
        }
    }

    fn to_batch(&mut self, records: &[ParsedLine]) -> Result<RecordBatch, BatchSourceError> {
        let pairs: usize = records.iter().map(|record| record.pairs.len()).sum();
        let explicit = records.iter().any(ParsedLine::has_explicit_value);

        let mut offsets = Vec::with_capacity(records.len() + 1);
        let mut indices = Vec::with_capacity(pairs);
        let mut values = Vec::with_capacity(if explicit { pairs } else { 0 });
        let mut labels = Vec::with_capacity(records.len());
        let mut weights = Vec::new();
        let mut query_ids = Vec::new();

        offsets.push(self.next_offset);
        for record in records {
            labels.push(record.label);
            weights.extend(record.weight);
            query_ids.extend(record.query_id);
            for &(index, value) in &record.pairs {
                indices.push(index);
                if explicit {
                    values.push(value.unwrap_or(1.0));
                }
            }
            self.next_offset += record.pairs.len();
            offsets.push(self.next_offset);
        }

        let mut batch = RecordBatch::try_new(offsets, indices)?.with_labels(labels)?;
        if explicit {
            batch = batch.with_values(values)?;
        }
        if !weights.is_empty() {
            batch = batch.with_weights(weights)?;
        }
        if !query_ids.is_empty() {
            batch = batch.with_query_ids(query_ids)?;
        }
        Ok(batch)
    }
}

impl<R: BufRead> BatchSource for LibSvmSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, BatchSourceError> {
        let records = match self.next_records() {
            Ok(Some(records)) => records,
            Ok(None) => return Ok(None),
            Err(err) => return Err(err.into_batch_source_error(&self.name)),
        };
        let batch = self.to_batch(&records)?;
        debug!(
            source = %self.name,
            rows = batch.size(),
            pairs = batch.nnz(),
            lines_read = self.line,
            "parsed batch"
        );
        Ok(Some(batch))
    }
}

impl<R> std::fmt::Debug for LibSvmSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibSvmSource")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}
