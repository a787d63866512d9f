//! TaskHooks - Taskwarrior hook entry point
//!
//! Installed as (or symlinked to) `on-add` and `on-modify` hooks.

use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::process;

use clap::Parser;
use eyre::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use taskhooks::cli::{Cli, Command, infer_subcommand};
use taskhooks::config::Config;
use taskhooks::dispatch::{self, on_add, on_modify};
use taskhooks::{DebugLog, TaskWarrior, handoff, policy};

fn setup_logging(log_dir: &Path, cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    fs::create_dir_all(log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Several hooks can run at once, so append rather than truncate
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("taskhooks.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() {
    let cli = Cli::parse_from(infer_subcommand(env::args_os()));

    // stdout is the tracker's feedback channel, so errors are reported there
    if let Err(e) = run(cli) {
        println!("{:#}", e);
        process::exit(dispatch::error_exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // A hook that cannot log must still answer the tracker
    if let Err(e) = setup_logging(&config.log_dir, cli.log_level.as_deref(), config.log_level.as_deref()) {
        eprintln!("Warning: {:#}", e);
    }

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::OnAdd { tracker_args } => {
            debug!("main: matched OnAdd command");
            cmd_hook(&config, false, &tracker_args)
        }
        Command::OnModify { tracker_args } => {
            debug!("main: matched OnModify command");
            cmd_hook(&config, true, &tracker_args)
        }
        Command::Policies => {
            debug!("main: matched Policies command");
            cmd_policies(&config);
            Ok(())
        }
    }
}

/// Run the on-add or on-modify chain against stdin
fn cmd_hook(config: &Config, modify: bool, tracker_args: &[String]) -> Result<()> {
    debug!(modify, ?tracker_args, "cmd_hook: called");
    let tracker = TaskWarrior::new(&config.task_command);
    let log = config.debug_log.as_ref().map(DebugLog::new).unwrap_or_default();
    log.record("invoked", json!({"modify": modify, "args": tracker_args}));

    let names = if modify {
        &config.hooks.on_modify
    } else {
        &config.hooks.on_add
    };
    let hooks = policy::chain(names, config).context("Failed to build hook chain")?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let handoff = if modify {
        on_modify(&tracker, &hooks, stdin.lock(), &mut stdout, &log)?
    } else {
        on_add(&tracker, &hooks, stdin.lock(), &mut stdout, &log)?
    };
    info!(exit_code = handoff.exit_code, jobs = handoff.jobs.len(), "cmd_hook: chain finished");
    handoff::finish(handoff, &tracker, &log)
}

/// List the policies and the configured chains
fn cmd_policies(config: &Config) {
    debug!("cmd_policies: called");
    for info in policy::POLICIES {
        println!("{:<20} {}", info.name, info.about);
    }
    println!();
    println!("on-add:    {}", config.hooks.on_add.join(", "));
    println!("on-modify: {}", config.hooks.on_modify.join(", "));
}
