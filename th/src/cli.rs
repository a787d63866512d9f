//! CLI command definitions

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

/// Taskwarrior hook dispatcher
#[derive(Parser, Debug)]
#[command(name = "th", author, version, about = "Run workflow policies as Taskwarrior hooks", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the on-add chain: one task on stdin
    OnAdd {
        /// Arguments Taskwarrior passes to hooks (api:, args:, command:, ...)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        tracker_args: Vec<String>,
    },

    /// Run the on-modify chain: original and modified task on stdin
    OnModify {
        /// Arguments Taskwarrior passes to hooks (api:, args:, command:, ...)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        tracker_args: Vec<String>,
    },

    /// List the available policies
    Policies,
}

/// Insert the subcommand implied by the program name
///
/// Taskwarrior runs hooks by file name (`on-add.taskhooks`, `on-modify-th`),
/// so a symlink with such a name to `th` selects the matching chain.
pub fn infer_subcommand<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();
    let program = args
        .first()
        .and_then(|p| Path::new(p).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let implied = if program.starts_with("on-add") {
        Some("on-add")
    } else if program.starts_with("on-modify") {
        Some("on-modify")
    } else {
        None
    };

    if let Some(subcommand) = implied {
        debug!(%program, subcommand, "infer_subcommand: implied by program name");
        args.insert(1.min(args.len()), OsString::from(subcommand));
    }
    args
}
