//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel PHPUnit test processor
#[derive(Parser, Debug)]
#[command(name = "ptp")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run PHPUnit test files in parallel, one database per worker")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: ./ptp.yaml, ~/.config/ptp/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root; overrides the configured project path
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run PHPUnit tests in parallel
    Run(RunArgs),

    /// List discovered tests
    List(ListArgs),

    /// Show failures recorded by the last run
    Failures(FailuresArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Number of parallel workers
    #[arg(short, long)]
    pub processors: Option<usize>,

    /// Folder where test discovery starts
    #[arg(short, long)]
    pub test_path: Option<PathBuf>,

    /// Filter test files by name (wildcards allowed, e.g. '*UserTest.php', '*Payment*')
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Only run test cases matching this name (passed to PHPUnit --filter)
    #[arg(long)]
    pub case: Option<String>,

    /// Stop dispatching new files after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Run only the files that failed in the last run
    #[arg(long, alias = "only-failed")]
    pub failed: bool,

    /// Rerun the failed files once and keep that result
    #[arg(long)]
    pub rerun_failures: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for list command
#[derive(Parser, Debug, Default)]
pub struct ListArgs {
    /// Folder where test discovery starts
    #[arg(short, long)]
    pub test_path: Option<PathBuf>,

    /// Filter test files by name
    #[arg(short, long)]
    pub filter: Option<String>,

    /// List test cases instead of test files
    #[arg(short = 'c', long)]
    pub test_cases: bool,
}

/// Arguments for failures command
#[derive(Parser, Debug, Default)]
pub struct FailuresArgs {
    /// Show the run summary only
    #[arg(short, long)]
    pub summary: bool,

    /// Export failures to a file (.json or .csv)
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Export format, inferred from the file extension when omitted
    #[arg(long)]
    pub format: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination file
        #[arg(default_value = "ptp.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Describe the recognised environment variables
    Env,
}
