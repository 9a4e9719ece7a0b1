use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dedupper")]
#[command(about = "Content-addressed media deduplication", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./Config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Judge and file every candidate under the given paths
    Process(ProcessArgs),
    /// Print configuration values
    PrintConfig,
    /// Delete every row of one classification type's store
    TruncateDb {
        /// Classification type, e.g. `image` or `video`
        file_type: String,
    },
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Files or directories; falls back to `root_paths` from the configuration
    pub paths: Vec<PathBuf>,

    /// Log every action without touching files or stores
    #[arg(long)]
    pub dry_run: bool,

    /// Move known files to where their stored record says they belong
    #[arg(long)]
    pub relocate: bool,

    /// Never rename on destination conflicts
    #[arg(long)]
    pub manual: bool,

    /// File incoming candidates into the keeping library
    #[arg(long)]
    pub keep: bool,

    /// Number of concurrent workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Write every (reason, path) row to this CSV file
    #[arg(long)]
    pub report: Option<PathBuf>,
}
