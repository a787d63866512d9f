//! The `blocks` pseudo-field
//!
//! `task add ... blocks:12,a1b2c3d4` reads better than editing the other
//! tasks' dependencies by hand. The field never reaches the database: the
//! named tasks gain a dependency on this task and the field is dropped.

use eyre::{Result, eyre};
use regex::Regex;
use taskjson::{Task, Text};
use tracing::debug;

use crate::hook::HookOutcome;
use crate::tracker::Tracker;

/// Task ids, id ranges, short UUIDs and full UUIDs
const REFERENCE_PATTERN: &str =
    r"^(?:\d+|\d+-\d+|[0-9a-f]{8}|[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$";

fn reference_regex() -> Result<Regex> {
    Regex::new(REFERENCE_PATTERN).map_err(|e| eyre!("Bad task reference pattern: {}", e))
}

/// Make the tasks listed in `blocks` depend on this task
pub fn blocks(tracker: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    let Some(references) = task.get_typed_opt::<Text>("blocks")?.map(Text::to_string) else {
        return Ok(HookOutcome::unchanged(task));
    };
    task.remove("blocks");
    debug!(%references, "blocks: called");

    let pattern = reference_regex()?;
    let mut blocked = Vec::new();
    for reference in references.split(',').map(str::trim) {
        if !pattern.is_match(reference) {
            return Ok(HookOutcome::failure(format!(
                "Could not parse '{}' as a task to block",
                reference
            )));
        }
        let found = tracker.export_tasks(&[reference.to_string()])?;
        if found.is_empty() {
            return Ok(HookOutcome::failure(format!(
                "Could not find a task matching '{}' to block",
                reference
            )));
        }
        blocked.extend(found.into_vec());
    }

    let uuid = task.uuid()?;
    let blocker = task.describe();
    let message = match blocked.as_slice() {
        [only] => format!("Task {} blocked by {}", only.describe(), blocker),
        [rest @ .., last] => format!(
            "Tasks {} and {} blocked by {}",
            rest.iter().map(Task::describe).collect::<Vec<_>>().join(", "),
            last.describe(),
            blocker
        ),
        [] => return Ok(HookOutcome::unchanged(task)),
    };

    for other in &mut blocked {
        other.add_dependency([uuid])?;
    }
    tracker.import_tasks(&blocked)?;
    Ok(HookOutcome::with_feedback(task, message))
}
