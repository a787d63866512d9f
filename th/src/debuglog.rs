//! Hook trace log
//!
//! An optional JSON-lines file recording what each hook invocation saw and
//! did. Several hook processes can run at once, so every record is appended
//! under an exclusive lock. Failures to write are logged and otherwise
//! ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde_json::Value as Json;
use taskjson::Date;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct Record<'a> {
    time: String,
    pid: u32,
    event: &'a str,
    data: Json,
}

/// Append-only trace of hook activity
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    path: Option<PathBuf>,
}

impl DebugLog {
    /// A log that records nothing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one event
    pub fn record(&self, event: &str, data: Json) {
        let Some(path) = &self.path else {
            return;
        };
        let record = Record {
            time: Date::now().get().format(taskjson::date::WIRE_FORMAT).to_string(),
            pid: std::process::id(),
            event,
            data,
        };
        if let Err(e) = append(path, &record) {
            warn!(path = %path.display(), error = %e, "DebugLog::record: failed to write");
        }
    }
}

fn append(path: &Path, record: &Record<'_>) -> std::io::Result<()> {
    debug!(event = record.event, "debuglog::append: called");
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
    let unlocked = FileExt::unlock(&file);
    written.and(unlocked)
}
