use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rustle-posix CLI: run one module against a target, natively or through the raw shell
#[derive(Parser, Debug)]
#[command(name = "rustle-posix")]
#[command(about = "Command execution and line editing with a raw POSIX shell fallback")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct RustlePosixCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to $RUSTLE_POSIX_CONFIG or ~/.config/rustle-posix/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Target host reached over ssh (localhost runs locally)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Make no changes, report what would change
    #[arg(long, global = true)]
    pub check: bool,

    /// Include before/after content for changed files
    #[arg(long, global = true)]
    pub diff: bool,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a module and print its result as JSON
    Run {
        /// Module name (command, lineinfile_dedupe, slurp)
        module: String,

        /// Module argument as key=value, may be repeated
        #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,

        /// Module arguments as a JSON object, merged under --arg values
        #[arg(long)]
        args_json: Option<String>,
    },

    /// Probe the target for the native runtime and report the selected mode
    Probe {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show module documentation
    Doc {
        /// Module name
        module: String,
    },

    /// List available modules
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub check: bool,
    pub diff: bool,
    pub verbosity: u8,
}

impl From<&RustlePosixCli> for ExecutionOptions {
    fn from(cli: &RustlePosixCli) -> Self {
        Self {
            config: cli.config.clone(),
            host: cli.host.clone(),
            check: cli.check,
            diff: cli.diff,
            verbosity: cli.verbosity,
        }
    }
}
