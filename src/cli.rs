use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::program::View;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "snw")]
#[command(about = "Replay tutorial-authoring commands and render every step's code")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log engine decisions at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a JSON command script and render the resulting steps
    Replay(ReplayArgs),

    /// List steps whose snapshot changes after a point in a script
    Changed(ChangedArgs),

    /// Initialize a snipweave.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Rendered code per step
    Text,
    /// Partial programs as JSON
    Json,
    /// Chunk table
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Snapshot,
    Snippet,
}

impl From<ViewArg> for View {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Snapshot => View::Snapshot,
            ViewArg::Snippet => View::Snippet,
        }
    }
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON array of commands
    pub script: PathBuf,

    /// Override the configured view
    #[arg(long, value_enum)]
    pub view: Option<ViewArg>,

    /// Only render this path
    #[arg(long)]
    pub path: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Print the final engine state as JSON and exit
    #[arg(long)]
    pub dump_state: bool,
}

#[derive(Debug, Args)]
pub struct ChangedArgs {
    /// JSON array of commands
    pub script: PathBuf,

    /// Number of commands that make up the "before" state
    #[arg(long)]
    pub split_at: usize,
}

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
