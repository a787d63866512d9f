//! Hook protocol types
//!
//! A hook takes the task being added or modified (and, for modifications,
//! the original) and returns a [`HookOutcome`]. Success carries the possibly
//! changed task, an optional feedback message and an optional [`Job`] to run
//! once the tracker has moved on. Failure carries an exit code and a message
//! and never a task.

use std::fmt;
use std::num::NonZeroI32;

use eyre::Result;
use serde_json::{Value as Json, json};
use taskjson::Task;

use crate::tracker::{Tracker, tasks_to_json};

/// Result of running one hook
#[derive(Debug)]
pub enum HookOutcome {
    Success {
        task: Task,
        feedback: Option<String>,
        job: Option<Job>,
    },
    Failure {
        code: NonZeroI32,
        message: String,
    },
}

impl HookOutcome {
    /// Success with no feedback
    pub fn unchanged(task: Task) -> Self {
        Self::Success {
            task,
            feedback: None,
            job: None,
        }
    }

    pub fn with_feedback(task: Task, feedback: impl Into<String>) -> Self {
        Self::Success {
            task,
            feedback: Some(feedback.into()),
            job: None,
        }
    }

    /// Failure with exit code 1
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            code: FAILURE_CODE,
            message: message.into(),
        }
    }

    pub fn failure_with_code(code: NonZeroI32, message: impl Into<String>) -> Self {
        Self::Failure {
            code,
            message: message.into(),
        }
    }

    /// Attach a deferred job to a successful outcome; failures are returned as is
    pub fn and_job(self, new_job: Job) -> Self {
        match self {
            Self::Success { task, feedback, .. } => Self::Success {
                task,
                feedback,
                job: Some(new_job),
            },
            failure => failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Exit status for failures that don't pick their own
pub const FAILURE_CODE: NonZeroI32 = NonZeroI32::new(1).unwrap();

/// A named policy run by the dispatcher
pub trait Hook {
    fn name(&self) -> &str;

    /// Run against `task`; `orig` is the unmodified task on the modify path
    fn run(&self, tracker: &dyn Tracker, task: Task, orig: Option<&Task>) -> Result<HookOutcome>;
}

/// A hook built from a function or closure
pub struct FnHook<F> {
    name: String,
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(&dyn Tracker, Task, Option<&Task>) -> Result<HookOutcome>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&dyn Tracker, Task, Option<&Task>) -> Result<HookOutcome>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, tracker: &dyn Tracker, task: Task, orig: Option<&Task>) -> Result<HookOutcome> {
        (self.func)(tracker, task, orig)
    }
}

impl<F> fmt::Debug for FnHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook").field("name", &self.name).finish_non_exhaustive()
    }
}

type JobAction = Box<dyn FnOnce(&dyn Tracker) -> Result<()>>;

/// A deferred action, run after the tracker has finished with this hook
pub struct Job {
    name: String,
    args: Json,
    action: JobAction,
}

impl Job {
    /// `args` only describes the job in the debug log
    pub fn new(name: impl Into<String>, args: Json, action: impl FnOnce(&dyn Tracker) -> Result<()> + 'static) -> Self {
        Self {
            name: name.into(),
            args,
            action: Box::new(action),
        }
    }

    /// Import tasks into the tracker
    pub fn import(mut tasks: Vec<Task>) -> Result<Self> {
        // Generate deferred UUIDs now so the log shows what gets imported
        for task in &mut tasks {
            task.resolve();
        }
        let args: Json = serde_json::from_str(&tasks_to_json(&tasks)?)?;
        Ok(Self::new("import_tasks", args, move |tracker: &dyn Tracker| {
            tracker.import_tasks(&tasks)?;
            Ok(())
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON description for the debug log
    pub fn describe(&self) -> Json {
        json!({"function": self.name, "args": self.args})
    }

    pub fn run(self, tracker: &dyn Tracker) -> Result<()> {
        (self.action)(tracker)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
