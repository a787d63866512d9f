//! Problem detection
//!
//! A [`TaskProblem`] is a named predicate over a task. Checking a task against
//! a set of problems records the descriptions of the ones that apply in the
//! comma-separated `problems` field, and keeps a `problems` tag in step with it.

use std::fmt;

use tracing::debug;

use crate::document::Document;
use crate::error::DocError;
use crate::scalar::Text;
use crate::task::{Task, TaskSchema};
use crate::value::Value;

const PROBLEMS_KEY: &str = "problems";
const PROBLEMS_TAG: &str = "problems";
const SEPARATOR: &str = ", ";

type ProblemTest = Box<dyn Fn(&Task) -> bool + Send + Sync>;

/// A condition a task should not be in
pub struct TaskProblem {
    description: String,
    test: ProblemTest,
}

impl TaskProblem {
    pub fn new(description: impl Into<String>, test: impl Fn(&Task) -> bool + Send + Sync + 'static) -> Self {
        Self {
            description: description.into(),
            test: Box::new(test),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True if `task` has this problem
    pub fn test(&self, task: &Task) -> bool {
        (self.test)(task)
    }
}

impl fmt::Debug for TaskProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskProblem")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// What a problem check changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProblemChange {
    pub added: bool,
    pub removed: bool,
}

impl ProblemChange {
    pub fn is_unchanged(self) -> bool {
        !self.added && !self.removed
    }
}

impl Document<TaskSchema> {
    /// Recorded problem descriptions, in the order they were found
    pub fn problems(&self) -> Vec<&str> {
        match self.get_opt(PROBLEMS_KEY) {
            Some(Value::Text(s)) if !s.as_str().is_empty() => s.as_str().split(SEPARATOR).collect(),
            _ => Vec::new(),
        }
    }

    /// Test each problem and update the `problems` field and tag to match
    pub fn check_log_problems(&mut self, problems: &[TaskProblem]) -> Result<ProblemChange, DocError> {
        let mut change = ProblemChange::default();

        for problem in problems {
            let has_problem = problem.test(self);
            let mut current: Vec<String> = self.problems().into_iter().map(str::to_string).collect();
            let recorded = current.iter().any(|p| p == problem.description());

            if has_problem && !recorded {
                debug!(problem = problem.description(), "Task::check_log_problems: problem added");
                current.push(problem.description().to_string());
                change.added = true;
            } else if !has_problem && recorded {
                debug!(problem = problem.description(), "Task::check_log_problems: problem removed");
                current.retain(|p| p != problem.description());
                change.removed = true;
            } else {
                continue;
            }

            if current.is_empty() {
                self.remove(PROBLEMS_KEY);
                if self.has_tag(PROBLEMS_TAG) {
                    self.untag([PROBLEMS_TAG])?;
                }
            } else {
                self.put(PROBLEMS_KEY.to_string(), Value::Text(Text::new(current.join(SEPARATOR))));
                self.tag([PROBLEMS_TAG])?;
            }
        }

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_project() -> TaskProblem {
        TaskProblem::new("no project", |t: &Task| !t.contains("project"))
    }

    fn no_due() -> TaskProblem {
        TaskProblem::new("no due date", |t: &Task| !t.contains("due"))
    }

    #[test]
    fn test_problem_added_and_tagged() {
        let mut t = Task::from_json(&json!({"description": "d"})).unwrap();
        let change = t.check_log_problems(&[no_project(), no_due()]).unwrap();
        assert!(change.added);
        assert!(!change.removed);
        assert_eq!(t.problems(), vec!["no project", "no due date"]);
        assert!(t.has_tag("problems"));
    }

    #[test]
    fn test_problem_removed_and_untagged() {
        let mut t = Task::from_json(&json!({
            "description": "d",
            "project": "home",
            "problems": "no project",
            "tags": ["problems", "home"]
        }))
        .unwrap();
        let change = t.check_log_problems(&[no_project()]).unwrap();
        assert_eq!(change, ProblemChange { added: false, removed: true });
        assert!(!t.contains("problems"));
        assert!(!t.has_tag("problems"));
        assert!(t.has_tag("home"));
    }

    #[test]
    fn test_both_flags() {
        let mut t = Task::from_json(&json!({
            "description": "d",
            "project": "home",
            "problems": "no project",
            "tags": ["problems"]
        }))
        .unwrap();
        let change = t.check_log_problems(&[no_project(), no_due()]).unwrap();
        assert!(change.added && change.removed);
        assert_eq!(t.problems(), vec!["no due date"]);
        assert!(t.has_tag("problems"));
    }

    #[test]
    fn test_unchanged() {
        let mut t = Task::from_json(&json!({"description": "d", "project": "p"})).unwrap();
        assert!(t.check_log_problems(&[no_project()]).unwrap().is_unchanged());
        assert!(!t.contains("tags"));
    }
}
