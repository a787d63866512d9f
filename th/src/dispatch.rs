//! Hook chain dispatch
//!
//! The tracker writes the task (on-add) or the original and modified task
//! (on-modify) to the hook's stdin, one JSON object per line. The chain
//! threads the task through every hook in order. If all succeed, the final
//! task goes back on stdout as one line, followed by one line of feedback if
//! any hook had something to say. The first failure stops the chain and only
//! its message is written.

use std::io::{BufRead, Write};
use std::num::NonZeroI32;

use eyre::{Context, Result};
use serde_json::json;
use taskjson::Task;
use tracing::{debug, info, warn};

use crate::debuglog::DebugLog;
use crate::hook::{FAILURE_CODE, Hook, HookOutcome, Job};
use crate::tracker::Tracker;

/// Separator between feedback messages from different hooks
pub const FEEDBACK_SEPARATOR: &str = "; ";

/// Outcome of a whole chain
#[derive(Debug)]
pub enum ChainResult {
    Success {
        task: Task,
        feedback: Vec<String>,
        jobs: Vec<Job>,
    },
    Failure {
        code: NonZeroI32,
        message: String,
    },
}

/// What is left to do after the response has been written
#[derive(Debug)]
pub struct Handoff {
    pub exit_code: i32,
    pub jobs: Vec<Job>,
}

impl Handoff {
    fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            jobs: Vec::new(),
        }
    }
}

/// Run `hooks` in order over `task`, stopping at the first failure
pub fn run_chain(
    tracker: &dyn Tracker,
    hooks: &[Box<dyn Hook>],
    mut task: Task,
    orig: Option<&Task>,
    log: &DebugLog,
) -> ChainResult {
    debug!(hooks = hooks.len(), modify = orig.is_some(), "run_chain: called");
    let mut feedback = Vec::new();
    let mut jobs = Vec::new();

    for hook in hooks {
        debug!(hook = hook.name(), "run_chain: running hook");
        let outcome = hook.run(tracker, task, orig).unwrap_or_else(|e| {
            warn!(hook = hook.name(), error = %e, "run_chain: hook returned an error");
            HookOutcome::failure(format!("{}: {:#}", hook.name(), e))
        });

        match outcome {
            HookOutcome::Success {
                task: next,
                feedback: message,
                job,
            } => {
                log.record(
                    "hook-result",
                    json!({
                        "hook": hook.name(),
                        "status": 0,
                        "task": next.to_json().ok(),
                        "feedback": message,
                        "job": job.as_ref().map(Job::describe),
                    }),
                );
                task = next;
                feedback.extend(message);
                jobs.extend(job);
            }
            HookOutcome::Failure { code, message } => {
                info!(hook = hook.name(), code = code.get(), %message, "run_chain: hook failed");
                log.record(
                    "hook-result",
                    json!({"hook": hook.name(), "status": code.get(), "feedback": message}),
                );
                return ChainResult::Failure { code, message };
            }
        }
    }

    ChainResult::Success { task, feedback, jobs }
}

fn read_task<R: BufRead>(input: &mut R, which: &str) -> Result<Task> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {} task from tracker", which))?;
    Task::from_json_str(line.trim_end()).with_context(|| format!("Failed to parse {} task {:?}", which, line.trim_end()))
}

fn respond<W: Write>(result: ChainResult, output: &mut W) -> Result<Handoff> {
    match result {
        ChainResult::Success {
            mut task,
            feedback,
            jobs,
        } => {
            writeln!(output, "{}", task.to_json_string().context("Failed to serialize task")?)?;
            if !feedback.is_empty() {
                writeln!(output, "{}", feedback.join(FEEDBACK_SEPARATOR))?;
            }
            output.flush()?;
            Ok(Handoff { exit_code: 0, jobs })
        }
        ChainResult::Failure { code, message } => {
            writeln!(output, "{}", message)?;
            output.flush()?;
            Ok(Handoff::exit(code.get()))
        }
    }
}

/// Handle an on-add invocation
pub fn on_add<R: BufRead, W: Write>(
    tracker: &dyn Tracker,
    hooks: &[Box<dyn Hook>],
    mut input: R,
    output: &mut W,
    log: &DebugLog,
) -> Result<Handoff> {
    debug!("on_add: called");
    let task = read_task(&mut input, "added")?;
    log.record("on-add", json!({"task": task.to_json().ok()}));
    let result = run_chain(tracker, hooks, task, None, log);
    respond(result, output)
}

/// Handle an on-modify invocation
pub fn on_modify<R: BufRead, W: Write>(
    tracker: &dyn Tracker,
    hooks: &[Box<dyn Hook>],
    mut input: R,
    output: &mut W,
    log: &DebugLog,
) -> Result<Handoff> {
    debug!("on_modify: called");
    let mut orig = read_task(&mut input, "original")?;
    let modified = read_task(&mut input, "modified")?;
    log.record(
        "on-modify",
        json!({"original": orig.to_json().ok(), "modified": modified.to_json().ok()}),
    );

    // `task undo` of a freshly added task sends an empty modified task; the
    // only answer the tracker accepts is the original
    if modified.is_empty() {
        info!("on_modify: empty modified task, echoing original");
        writeln!(output, "{}", orig.to_json_string().context("Failed to serialize task")?)?;
        output.flush()?;
        return Ok(Handoff::exit(0));
    }

    let result = run_chain(tracker, hooks, modified, Some(&orig), log);
    respond(result, output)
}

/// Exit code for a dispatcher error that happens before any hook ran
pub fn error_exit_code() -> i32 {
    FAILURE_CODE.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::FnHook;
    use crate::tracker::MemoryTracker;
    use serde_json::Value as Json;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn boxed<F>(name: &str, f: F) -> Box<dyn Hook>
    where
        F: Fn(&dyn Tracker, Task, Option<&Task>) -> Result<HookOutcome> + 'static,
    {
        Box::new(FnHook::new(name, f))
    }

    fn feedback_hook(name: &'static str, calls: Rc<RefCell<Vec<&'static str>>>) -> Box<dyn Hook> {
        boxed(name, move |_: &dyn Tracker, task: Task, _: Option<&Task>| {
            calls.borrow_mut().push(name);
            Ok(HookOutcome::with_feedback(task, format!("{} ran", name)))
        })
    }

    fn failing_hook(code: i32, calls: Rc<RefCell<Vec<&'static str>>>) -> Box<dyn Hook> {
        boxed("fails", move |_: &dyn Tracker, _: Task, _: Option<&Task>| {
            calls.borrow_mut().push("fails");
            let code = NonZeroI32::new(code).ok_or_else(|| eyre::eyre!("zero code"))?;
            Ok(HookOutcome::failure_with_code(code, "h2 says no"))
        })
    }

    fn run_add(hooks: &[Box<dyn Hook>], input: &str) -> (Handoff, String) {
        let mut out = Vec::new();
        let handoff = on_add(&MemoryTracker::new(), hooks, Cursor::new(input), &mut out, &DebugLog::disabled()).unwrap();
        (handoff, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_feedback_joined_in_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let hooks = vec![feedback_hook("h1", calls.clone()), feedback_hook("h2", calls.clone())];
        let (handoff, out) = run_add(&hooks, "{\"description\":\"a\"}\n");
        assert_eq!(handoff.exit_code, 0);
        assert_eq!(out, "{\"description\":\"a\"}\nh1 ran; h2 ran\n");
    }

    #[test]
    fn test_no_feedback_line_when_silent() {
        let hooks = vec![boxed("quiet", |_: &dyn Tracker, t: Task, _: Option<&Task>| Ok(HookOutcome::unchanged(t)))];
        let (_, out) = run_add(&hooks, "{\"description\":\"a\"}\n");
        assert_eq!(out, "{\"description\":\"a\"}\n");
    }

    #[test]
    fn test_failure_short_circuits() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let hooks = vec![
            feedback_hook("h1", calls.clone()),
            failing_hook(3, calls.clone()),
            feedback_hook("h3", calls.clone()),
        ];
        let (handoff, out) = run_add(&hooks, "{\"description\":\"a\"}\n");
        assert_eq!(handoff.exit_code, 3);
        assert!(handoff.jobs.is_empty());
        assert_eq!(out, "h2 says no\n");
        assert_eq!(*calls.borrow(), vec!["h1", "fails"]);
    }

    #[test]
    fn test_hook_error_becomes_failure() {
        let hooks = vec![boxed("broken", |_: &dyn Tracker, _: Task, _: Option<&Task>| {
            Err(eyre::eyre!("disk on fire"))
        })];
        let (handoff, out) = run_add(&hooks, "{\"description\":\"a\"}\n");
        assert_eq!(handoff.exit_code, 1);
        assert_eq!(out, "broken: disk on fire\n");
    }

    #[test]
    fn test_jobs_collected_in_hook_order() {
        let hooks: Vec<Box<dyn Hook>> = ["first", "second"]
            .into_iter()
            .map(|name| {
                boxed(name, move |_: &dyn Tracker, t: Task, _: Option<&Task>| {
                    Ok(HookOutcome::unchanged(t).and_job(Job::new(name, Json::Null, |_| Ok(()))))
                })
            })
            .collect();
        let (handoff, _) = run_add(&hooks, "{\"description\":\"a\"}\n");
        let names: Vec<&str> = handoff.jobs.iter().map(Job::name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_modify_passes_original() {
        let hooks = vec![boxed("orig-aware", |_: &dyn Tracker, t: Task, orig: Option<&Task>| {
            let orig = orig.ok_or_else(|| eyre::eyre!("no original"))?;
            Ok(HookOutcome::with_feedback(t, orig.describe()))
        })];
        let mut out = Vec::new();
        let input = "{\"description\":\"old\"}\n{\"description\":\"new\"}\n";
        let handoff = on_modify(&MemoryTracker::new(), &hooks, Cursor::new(input), &mut out, &DebugLog::disabled()).unwrap();
        assert_eq!(handoff.exit_code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"description\":\"new\"}\n'old'\n");
    }

    #[test]
    fn test_modify_with_empty_task_echoes_original() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let hooks = vec![feedback_hook("h1", calls.clone())];
        let mut out = Vec::new();
        let input = "{\"description\":\"old\",\"status\":\"pending\"}\n{}\n";
        let handoff = on_modify(&MemoryTracker::new(), &hooks, Cursor::new(input), &mut out, &DebugLog::disabled()).unwrap();
        assert_eq!(handoff.exit_code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"description\":\"old\",\"status\":\"pending\"}\n");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_bad_input_is_error() {
        let mut out = Vec::new();
        let result = on_add(&MemoryTracker::new(), &[], Cursor::new("not json\n"), &mut out, &DebugLog::disabled());
        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
