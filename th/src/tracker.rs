//! Access to the task tracker
//!
//! Hooks only need a handful of tracker operations, so they go through the
//! [`Tracker`] trait. [`TaskWarrior`] runs the `task` binary; [`MemoryTracker`]
//! keeps tasks in memory for tests and dry runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use serde_json::Value as Json;
use taskjson::{Annotation, Date, Duration, Int, Task, TaskList, Typed, Uuid};
use tracing::debug;

use crate::error::TrackerError;

/// Operations hooks may perform against the tracker
pub trait Tracker {
    /// Evaluate an expression with the tracker's own calculator
    fn calc(&self, expr: &str) -> Result<String, TrackerError>;

    /// Write tasks back, creating or updating them by UUID
    fn import_tasks(&self, tasks: &[Task]) -> Result<(), TrackerError>;

    /// Read the tasks matching a filter; an empty filter means all tasks
    fn export_tasks(&self, filter: &[String]) -> Result<TaskList, TrackerError>;

    fn calc_datetime(&self, expr: &str) -> Result<Date, TrackerError> {
        let out = self.calc(expr)?;
        Date::parse_str(&out).map_err(|e| TrackerError::Parse {
            output: out,
            reason: e.to_string(),
        })
    }

    /// Interpret a date field value the way the tracker would
    ///
    /// Timestamps are taken as they are. Anything else goes through `calc`,
    /// whose answer is either a timestamp or a duration from now.
    fn resolve_date(&self, expr: &str) -> Result<Date, TrackerError> {
        debug!(expr, "Tracker::resolve_date: called");
        if let Ok(date) = Date::parse_str(expr) {
            return Ok(date);
        }
        let out = self.calc(expr)?;
        if let Ok(date) = Date::parse_str(&out) {
            return Ok(date);
        }
        let offset = Duration::parse_str(&out).map_err(|e| TrackerError::Parse {
            output: out.clone(),
            reason: e.to_string(),
        })?;
        Ok(Date::now().checked_add(offset)?)
    }

    fn calc_bool(&self, expr: &str) -> Result<bool, TrackerError> {
        let out = self.calc(expr)?;
        match out.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(TrackerError::Parse {
                output: out,
                reason: "neither 'true' nor 'false'".to_string(),
            }),
        }
    }

    /// Fetch exactly one task by UUID
    fn get_task(&self, uuid: Uuid) -> Result<Task, TrackerError> {
        debug!(%uuid, "Tracker::get_task: called");
        let tasks = self.export_tasks(&[uuid.to_string()])?;
        let count = tasks.len();
        match tasks.into_vec().into_iter().next() {
            Some(task) if count == 1 => Ok(task),
            _ => Err(TrackerError::TaskCount { uuid, count }),
        }
    }

    /// Add an annotation to the task with this UUID
    fn annotate_task(&self, uuid: Uuid, annotation: Annotation) -> Result<(), TrackerError> {
        debug!(%uuid, "Tracker::annotate_task: called");
        let mut task = self.get_task(uuid)?;
        task.add_annotation(annotation)?;
        self.import_tasks(&[task])
    }
}

/// Serialize tasks as the JSON array `task import` reads
pub fn tasks_to_json(tasks: &[Task]) -> Result<String, TrackerError> {
    let parts = tasks
        .iter()
        .map(|task| task.clone().to_json_string())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", parts.join(",")))
}

/// Find the single `Created task <uuid>.` line `task add` prints with `rc.verbose=new-uuid`
pub fn created_uuid(output: &str) -> Result<Uuid, TrackerError> {
    let mut found = None;
    for line in output.lines() {
        let Some(rest) = line.strip_prefix("Created task ").and_then(|r| r.strip_suffix('.')) else {
            continue;
        };
        if found.is_some() {
            return Err(TrackerError::Parse {
                output: output.to_string(),
                reason: "more than one task UUID in `task add` output".to_string(),
            });
        }
        let uuid = rest.parse::<Uuid>().map_err(|e| TrackerError::Parse {
            output: output.to_string(),
            reason: e.to_string(),
        })?;
        found = Some(uuid);
    }
    found.ok_or_else(|| TrackerError::Parse {
        output: output.to_string(),
        reason: "no task UUID in `task add` output".to_string(),
    })
}

/// The `task` command line program
#[derive(Debug, Clone)]
pub struct TaskWarrior {
    executable: PathBuf,
}

impl Default for TaskWarrior {
    fn default() -> Self {
        Self::new("task")
    }
}

impl TaskWarrior {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Run `task add` with command line arguments, returning the new task's UUID
    pub fn add_task(&self, args: &[String]) -> Result<Uuid, TrackerError> {
        debug!(?args, "TaskWarrior::add_task: called");
        let mut full: Vec<&str> = vec!["add"];
        full.extend(args.iter().map(String::as_str));
        let out = self.run_verbose("new-uuid", &full, None)?;
        created_uuid(&out)
    }

    fn run(&self, args: &[&str], input: Option<&str>) -> Result<String, TrackerError> {
        self.run_verbose("nothing", args, input)
    }

    fn run_verbose(&self, verbose: &str, args: &[&str], input: Option<&str>) -> Result<String, TrackerError> {
        let command = format!("{} {}", self.executable.display(), args.join(" "));
        debug!(%command, "TaskWarrior::run: called");

        let mut child = Command::new(&self.executable)
            .arg(format!("rc.verbose={}", verbose))
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from its own thread so a chatty tracker can't fill the
        // output pipes while we are still writing
        let writer = match (input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                let input = input.to_string();
                Some(thread::spawn(move || stdin.write_all(input.as_bytes())))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| io::Error::other("stdin writer thread panicked"))??;
        }
        if !output.status.success() {
            debug!(%command, status = %output.status, "TaskWarrior::run: command failed");
            return Err(TrackerError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Tracker for TaskWarrior {
    fn calc(&self, expr: &str) -> Result<String, TrackerError> {
        Ok(self.run(&["rc.date.iso=yes", "calc", expr], None)?.trim().to_string())
    }

    fn import_tasks(&self, tasks: &[Task]) -> Result<(), TrackerError> {
        debug!(count = tasks.len(), "TaskWarrior::import_tasks: called");
        let json = tasks_to_json(tasks)?;
        self.run(&["import", "-"], Some(&json))?;
        Ok(())
    }

    fn export_tasks(&self, filter: &[String]) -> Result<TaskList, TrackerError> {
        debug!(?filter, "TaskWarrior::export_tasks: called");
        let mut args: Vec<&str> = filter.iter().map(String::as_str).collect();
        args.push("export");
        let out = self.run(&args, None)?;
        let json: Json = serde_json::from_str(&out).map_err(|e| TrackerError::Parse {
            output: out.clone(),
            reason: e.to_string(),
        })?;
        Ok(TaskList::parse(&json)?)
    }
}

/// A tracker that keeps its tasks in memory
///
/// Filters understand only single ids, id ranges (`3-5`), short UUIDs and
/// full UUIDs. Calculator results have to be registered up front.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    tasks: RefCell<Vec<Task>>,
    calc_results: HashMap<String, String>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: RefCell::new(tasks.into_iter().collect()),
            calc_results: HashMap::new(),
        }
    }

    /// Register the answer `calc` gives for an expression
    pub fn with_calc(mut self, expr: impl Into<String>, result: impl Into<String>) -> Self {
        self.calc_results.insert(expr.into(), result.into());
        self
    }

    /// Snapshot of every stored task
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    fn matches(task: &Task, term: &str) -> Result<bool, TrackerError> {
        let id = task.get_typed_opt::<Int>("id")?.map(|i| i.get()).unwrap_or(0);
        if let Some((lo, hi)) = term.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<i64>(), hi.parse::<i64>()) {
                return Ok(id != 0 && (lo..=hi).contains(&id));
            }
        }
        if let Ok(n) = term.parse::<i64>() {
            return Ok(id != 0 && id == n);
        }
        let uuid = task.uuid_opt().map(|u| u.to_string());
        if term.len() == 36 {
            return Ok(uuid.as_deref() == Some(term));
        }
        if term.len() == 8 && term.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(uuid.is_some_and(|u| u.starts_with(term)));
        }
        Err(TrackerError::CommandFailed {
            command: format!("export {}", term),
            status: "unsupported".to_string(),
            stderr: format!("filter {:?} is not supported in memory", term),
        })
    }
}

impl Tracker for MemoryTracker {
    fn calc(&self, expr: &str) -> Result<String, TrackerError> {
        self.calc_results
            .get(expr)
            .cloned()
            .ok_or_else(|| TrackerError::CommandFailed {
                command: format!("calc {}", expr),
                status: "unknown expression".to_string(),
                stderr: String::new(),
            })
    }

    fn import_tasks(&self, tasks: &[Task]) -> Result<(), TrackerError> {
        debug!(count = tasks.len(), "MemoryTracker::import_tasks: called");
        let mut stored = self.tasks.borrow_mut();
        for task in tasks {
            let mut task = task.clone().with_generated_uuid();
            let uuid = task.uuid()?;
            match stored.iter_mut().find(|t| t.uuid_opt() == Some(uuid)) {
                Some(existing) => *existing = task,
                None => stored.push(task),
            }
        }
        Ok(())
    }

    fn export_tasks(&self, filter: &[String]) -> Result<TaskList, TrackerError> {
        debug!(?filter, "MemoryTracker::export_tasks: called");
        let stored = self.tasks.borrow();
        let mut out = TaskList::new();
        for task in stored.iter() {
            let mut keep = true;
            for term in filter {
                if !Self::matches(task, term)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                out.push(task.clone());
            }
        }
        Ok(out)
    }
}
