//! TaskHooks - workflow policies for Taskwarrior
//!
//! Taskwarrior runs hook programs when tasks are added or modified, passing
//! the task as JSON on stdin and reading it back from stdout. This crate
//! threads that task through a configurable chain of policies.
//!
//! # Modules
//!
//! - [`dispatch`] - Chain execution and the stdin/stdout protocol
//! - [`hook`] - Hook trait, outcomes and deferred jobs
//! - [`handoff`] - Running deferred jobs once the tracker has moved on
//! - [`policy`] - The policies and the registry that names them
//! - [`tracker`] - Tracker access for policies and jobs
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod debuglog;
pub mod dispatch;
pub mod error;
pub mod handoff;
pub mod hook;
pub mod policy;
pub mod tracker;

pub use config::Config;
pub use debuglog::DebugLog;
pub use dispatch::{ChainResult, FEEDBACK_SEPARATOR, Handoff, on_add, on_modify, run_chain};
pub use error::TrackerError;
pub use hook::{FnHook, Hook, HookOutcome, Job};
pub use tracker::{MemoryTracker, TaskWarrior, Tracker};
