//! Tracker error types

use taskjson::{DocError, Uuid};
use thiserror::Error;

/// Errors from talking to the tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Found {count} tasks with UUID {uuid}")]
    TaskCount { uuid: Uuid, count: usize },

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to run tracker: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid task data from tracker: {0}")]
    Doc(#[from] DocError),

    #[error("Could not interpret tracker output {output:?}: {reason}")]
    Parse { output: String, reason: String },
}
