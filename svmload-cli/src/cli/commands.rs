use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use svmload::{
    IndexBase, LibSvmOptions, LoadError, LoadOptions, SparseMatrix, load_svmlight,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "svmload", about = "Load SVMLight files into CSR matrices.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Parse a file and print its dimensions.
    Load(LoadCommand),
}

/// Options accepted by the `load` command.
#[derive(Debug, Args, Clone)]
pub struct LoadCommand {
    /// Path to the SVMLight/LibSVM file.
    pub path: PathBuf,

    /// Worker threads; 0 uses every available core.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Log the running row count after each batch.
    #[arg(long)]
    pub verbose: bool,

    /// How feature indices map to columns.
    #[arg(long = "index-base", value_enum, default_value_t = IndexBaseArg::Zero)]
    pub index_base: IndexBaseArg,

    /// Bytes of input gathered per batch.
    #[arg(long = "batch-bytes", default_value_t = LibSvmOptions::default().batch_bytes())]
    pub batch_bytes: usize,

    /// Also print the CSR arrays.
    #[arg(long)]
    pub arrays: bool,

    /// Override name for the input (defaults to the file stem).
    #[arg(long)]
    pub name: Option<String>,
}

/// Index conventions selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndexBaseArg {
    /// Indices are column numbers as written.
    Zero,
    /// Indices start at one.
    One,
    /// Shift down only when no index 0 appears.
    Auto,
}

impl From<IndexBaseArg> for IndexBase {
    fn from(value: IndexBaseArg) -> Self {
        match value {
            IndexBaseArg::Zero => Self::Zero,
            IndexBaseArg::One => Self::One,
            IndexBaseArg::Auto => Self::Auto,
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading the input failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl CliError {
    /// Stable machine-readable code of the underlying failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Load(err) => err.code(),
        }
    }
}

/// Outcome of a `load` command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Name chosen for the input.
    pub data_source: String,
    /// The loaded matrix.
    pub matrix: SparseMatrix,
    /// Whether [`render_summary`] prints the arrays.
    pub show_arrays: bool,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use svmload_cli::cli::{Cli, Command, IndexBaseArg, LoadCommand, run_cli};
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(file.path(), "1 0:0.5 2:1.5\n0 1:2\n")?;
/// let cli = Cli {
///     command: Command::Load(LoadCommand {
///         path: file.path().to_path_buf(),
///         threads: 1,
///         verbose: false,
///         index_base: IndexBaseArg::Zero,
///         batch_bytes: 1024,
///         arrays: false,
///         name: None,
///     }),
/// };
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.matrix.num_cols(), 3);
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Load(load) => {
            Span::current().record("command", field::display("load"));
            run_command(load)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(
        path = field::Empty,
        threads = command.threads,
        index_base = ?command.index_base,
        override_name = field::Empty,
    ),
)]
pub(super) fn run_command(command: LoadCommand) -> Result<ExecutionSummary, CliError> {
    let LoadCommand {
        path,
        threads,
        verbose,
        index_base,
        batch_bytes,
        arrays,
        name,
    } = command;
    let span = Span::current();
    span.record("path", field::display(path.display()));
    span.record(
        "override_name",
        field::display(name.as_deref().unwrap_or("<derived>")),
    );

    let options = LoadOptions::new()
        .with_threads(threads)
        .with_verbose(verbose)
        .with_index_base(index_base.into())
        .with_batch_bytes(batch_bytes);
    let matrix = load_svmlight(&path, &options)?;
    let data_source = derive_data_source_name(&path, name.as_deref());

    info!(
        data_source = data_source.as_str(),
        rows = matrix.num_rows(),
        cols = matrix.num_cols(),
        nelem = matrix.nelem(),
        "command completed"
    );
    Ok(ExecutionSummary {
        data_source,
        matrix,
        show_arrays: arrays,
    })
}

pub(super) fn derive_data_source_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }

    path.file_stem()
        .and_then(|value| value.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "data_source".to_owned())
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    let matrix = &summary.matrix;
    writeln!(writer, "data source: {}", summary.data_source)?;
    writeln!(writer, "rows: {}", matrix.num_rows())?;
    writeln!(writer, "cols: {}", matrix.num_cols())?;
    writeln!(writer, "nelem: {}", matrix.nelem())?;
    writeln!(writer, "labels: {}", presence(matrix.labels()))?;
    writeln!(writer, "weights: {}", presence(matrix.weights()))?;
    writeln!(writer, "qids: {}", presence(matrix.query_ids()))?;
    if !summary.show_arrays {
        return Ok(());
    }

    write_array(&mut writer, "values", matrix.values())?;
    write_array(&mut writer, "column_indices", matrix.column_indices())?;
    write_array(&mut writer, "row_offsets", matrix.row_offsets())?;
    if let Some(labels) = matrix.labels() {
        write_array(&mut writer, "label_values", labels)?;
    }
    if let Some(weights) = matrix.weights() {
        write_array(&mut writer, "weight_values", weights)?;
    }
    if let Some(query_ids) = matrix.query_ids() {
        write_array(&mut writer, "qid_values", query_ids)?;
    }
    Ok(())
}

fn presence<T>(items: Option<&[T]>) -> &'static str {
    if items.is_some() { "yes" } else { "no" }
}

fn write_array<T: Display>(writer: &mut impl Write, label: &str, items: &[T]) -> io::Result<()> {
    write!(writer, "{label}:")?;
    for item in items {
        write!(writer, " {item}")?;
    }
    writeln!(writer)
}
