//! Tag-driven triage: the inbox and problem tags

use std::fmt;

use eyre::Result;
use taskjson::{Task, TaskProblem};
use tracing::debug;

use super::status;
use crate::hook::{Hook, HookOutcome};
use crate::tracker::Tracker;

const INBOX_TAG: &str = "inbox";

/// New tasks with no tags at all still need sorting
pub fn inbox_if_untagged(_: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    if task.has_tag(INBOX_TAG) || !task.tags().is_empty() {
        return Ok(HookOutcome::unchanged(task));
    }
    task.tag([INBOX_TAG])?;
    let message = format!("Added inbox tag to {}", task.describe());
    Ok(HookOutcome::with_feedback(task, message))
}

fn is_open(task: &Task) -> bool {
    !matches!(status(task), Ok(Some("completed" | "deleted")))
}

/// Open, triaged tasks without any context tag
pub fn missing_context(context_tags: Vec<String>) -> TaskProblem {
    TaskProblem::new("no context tags", move |task: &Task| {
        !task.has_tag(INBOX_TAG)
            && !task.has_tag("project")
            && !context_tags.iter().any(|tag| task.has_tag(tag))
            && is_open(task)
    })
}

/// Open, triaged tasks without a project
pub fn missing_project() -> TaskProblem {
    TaskProblem::new("no project", |task: &Task| {
        !task.has_tag(INBOX_TAG) && !task.contains("project") && is_open(task)
    })
}

/// Records workflow problems on tasks that have left the inbox
pub struct ProblemsHook {
    problems: Vec<TaskProblem>,
}

impl ProblemsHook {
    pub fn new(context_tags: &[String]) -> Self {
        Self {
            problems: vec![missing_context(context_tags.to_vec()), missing_project()],
        }
    }
}

impl Hook for ProblemsHook {
    fn name(&self) -> &str {
        "problems"
    }

    fn run(&self, _: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
        // Inbox tasks aren't expected to be set up properly yet
        if task.has_tag(INBOX_TAG) {
            return Ok(HookOutcome::unchanged(task));
        }
        let change = task.check_log_problems(&self.problems)?;
        debug!(?change, "ProblemsHook::run: checked");
        let message = match (change.added, change.removed) {
            (false, false) => return Ok(HookOutcome::unchanged(task)),
            (true, false) => format!("Found and tagged problems with {}", task.describe()),
            (false, true) => format!("Found and untagged resolved problems with {}", task.describe()),
            (true, true) => format!(
                "Found and tagged new problems, and removed old problems, with {}",
                task.describe()
            ),
        };
        Ok(HookOutcome::with_feedback(task, message))
    }
}

impl fmt::Debug for ProblemsHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProblemsHook").field("problems", &self.problems).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::MemoryTracker;
    use serde_json::json;

    fn task(json: serde_json::Value) -> Task {
        Task::from_json(&json).unwrap()
    }

    fn hook() -> ProblemsHook {
        ProblemsHook::new(&["home".to_string(), "work".to_string()])
    }

    fn feedback(outcome: HookOutcome) -> (Task, Option<String>) {
        match outcome {
            HookOutcome::Success { task, feedback, .. } => (task, feedback),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inbox_if_untagged() {
        let outcome = inbox_if_untagged(&MemoryTracker::new(), task(json!({"description": "buy milk"})), None).unwrap();
        let (t, message) = feedback(outcome);
        assert!(t.has_tag("inbox"));
        assert_eq!(message.as_deref(), Some("Added inbox tag to 'buy milk'"));
    }

    #[test]
    fn test_inbox_leaves_tagged_tasks() {
        let outcome = inbox_if_untagged(
            &MemoryTracker::new(),
            task(json!({"description": "d", "tags": ["home"]})),
            None,
        )
        .unwrap();
        let (t, message) = feedback(outcome);
        assert_eq!(t.tags().len(), 1);
        assert!(message.is_none());
    }

    #[test]
    fn test_problems_found() {
        let t = task(json!({"description": "d", "status": "pending", "tags": ["someday"]}));
        let (t, message) = feedback(hook().run(&MemoryTracker::new(), t, None).unwrap());
        assert_eq!(t.problems(), vec!["no context tags", "no project"]);
        assert!(t.has_tag("problems"));
        assert_eq!(message.as_deref(), Some("Found and tagged problems with 'd'"));
    }

    #[test]
    fn test_problems_resolved() {
        let t = task(json!({
            "description": "d",
            "status": "pending",
            "project": "house",
            "tags": ["home", "problems"],
            "problems": "no context tags, no project",
        }));
        let (t, message) = feedback(hook().run(&MemoryTracker::new(), t, None).unwrap());
        assert!(t.problems().is_empty());
        assert!(!t.has_tag("problems"));
        assert!(!t.contains("problems"));
        assert_eq!(message.as_deref(), Some("Found and untagged resolved problems with 'd'"));
    }

    #[test]
    fn test_problems_swapped() {
        let t = task(json!({
            "description": "d",
            "status": "pending",
            "tags": ["work", "problems"],
            "problems": "no context tags",
        }));
        let (t, message) = feedback(hook().run(&MemoryTracker::new(), t, None).unwrap());
        assert_eq!(t.problems(), vec!["no project"]);
        assert_eq!(
            message.as_deref(),
            Some("Found and tagged new problems, and removed old problems, with 'd'")
        );
    }

    #[test]
    fn test_problems_skip_inbox_and_closed_tasks() {
        let inbox = task(json!({"description": "d", "tags": ["inbox"]}));
        let (t, message) = feedback(hook().run(&MemoryTracker::new(), inbox, None).unwrap());
        assert!(t.problems().is_empty());
        assert!(message.is_none());

        let done = task(json!({"description": "d", "status": "completed"}));
        let (t, message) = feedback(hook().run(&MemoryTracker::new(), done, None).unwrap());
        assert!(t.problems().is_empty());
        assert!(message.is_none());
    }
}
