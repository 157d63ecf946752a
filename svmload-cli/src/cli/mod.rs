//! Command-line interface for loading SVMLight files.

mod commands;

pub use commands::{
    Cli, CliError, Command, ExecutionSummary, IndexBaseArg, LoadCommand, render_summary, run_cli,
};
