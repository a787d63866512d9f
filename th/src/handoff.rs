//! Deferred job handoff
//!
//! The tracker blocks until the hook closes stdout, but deferred jobs want to
//! run tracker commands themselves. So once the response is written the hook
//! forks: the original process exits straight away, and the child closes
//! stdout, waits for the original process to be gone, then runs the jobs in
//! the order they were queued.

use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::process;
use std::thread;
use std::time::Duration;

use eyre::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{ForkResult, Pid, fork, getpid};
use serde_json::json;
use tracing::{debug, error, info};

use crate::debuglog::DebugLog;
use crate::dispatch::Handoff;
use crate::hook::Job;
use crate::tracker::Tracker;

/// First delay between liveness checks
pub const PID_POLL_MIN: Duration = Duration::from_millis(1);

/// Longest delay between liveness checks
pub const PID_POLL_MAX: Duration = Duration::from_millis(500);

/// True while a process with this pid exists
///
/// Signal 0 checks for the process without delivering anything. `EPERM` means the process
/// exists but belongs to someone else.
pub fn pid_exists(pid: Pid) -> bool {
    match kill(pid, None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(Errno::EPERM) => true,
        Err(e) => {
            debug!(%pid, error = %e, "pid_exists: unexpected errno, assuming alive");
            true
        }
    }
}

/// Poll delays: doubling from [`PID_POLL_MIN`], capped at [`PID_POLL_MAX`]
pub fn poll_intervals() -> impl Iterator<Item = Duration> {
    std::iter::successors(Some(PID_POLL_MIN), |d| Some((*d * 2).min(PID_POLL_MAX)))
}

/// Block until `pid` has exited; returns the number of polls it took
pub fn wait_for_pid(pid: Pid) -> usize {
    debug!(%pid, "wait_for_pid: called");
    let mut polls = 0;
    for interval in poll_intervals() {
        if !pid_exists(pid) {
            break;
        }
        thread::sleep(interval);
        polls += 1;
    }
    debug!(%pid, polls, "wait_for_pid: process gone");
    polls
}

/// Run jobs in order, stopping at the first error
pub fn run_jobs(tracker: &dyn Tracker, jobs: Vec<Job>, log: &DebugLog) -> Result<()> {
    debug!(count = jobs.len(), "run_jobs: called");
    for job in jobs {
        let name = job.name().to_string();
        log.record("job-start", job.describe());
        if let Err(e) = job.run(tracker) {
            log.record("job-error", json!({"function": name, "error": format!("{:#}", e)}));
            return Err(e).with_context(|| format!("Deferred job {} failed", name));
        }
        info!(job = %name, "run_jobs: job finished");
    }
    Ok(())
}

/// Exit the hook, running any deferred jobs after handing control back to the tracker
pub fn finish(handoff: Handoff, tracker: &dyn Tracker, log: &DebugLog) -> ! {
    debug!(exit_code = handoff.exit_code, jobs = handoff.jobs.len(), "finish: called");
    if handoff.jobs.is_empty() {
        process::exit(handoff.exit_code);
    }

    if let Err(e) = std::io::stdout().flush() {
        error!(error = %e, "finish: failed to flush stdout");
    }
    let hook_pid = getpid();

    // SAFETY: the hook is single-threaded, so the child has no locks held by other threads.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(%child, "finish: forked job runner");
            process::exit(handoff.exit_code);
        }
        Ok(ForkResult::Child) => {
            close_stdout();
            wait_for_pid(hook_pid);
            match run_jobs(tracker, handoff.jobs, log) {
                Ok(()) => process::exit(0),
                Err(e) => {
                    error!(error = %format!("{:#}", e), "finish: deferred job failed");
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "finish: fork failed, deferred jobs dropped");
            log.record("fork-error", json!({"error": e.to_string()}));
            process::exit(1);
        }
    }
}

/// Close fd 1 so the tracker sees end of output
fn close_stdout() {
    let fd = std::io::stdout().as_raw_fd();
    // SAFETY: fd 1 is open and nothing else in this process writes to it after this point.
    drop(unsafe { OwnedFd::from_raw_fd(fd) });
    debug!("close_stdout: closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::MemoryTracker;
    use serde_json::Value as Json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_poll_intervals_double_then_cap() {
        let intervals: Vec<u128> = poll_intervals().take(12).map(|d| d.as_millis()).collect();
        assert_eq!(intervals, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 500, 500, 500]);
    }

    #[test]
    fn test_own_pid_exists() {
        assert!(pid_exists(getpid()));
    }

    #[test]
    fn test_exited_child_does_not_exist() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        child.wait().unwrap();
        assert!(!pid_exists(pid));
        assert_eq!(wait_for_pid(pid), 0);
    }

    #[test]
    fn test_wait_for_pid_returns_after_exit() {
        let mut child = std::process::Command::new("sleep").arg("0.05").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        let reaper = std::thread::spawn(move || child.wait());
        assert!(wait_for_pid(pid) > 0);
        reaper.join().unwrap().unwrap();
    }

    #[test]
    fn test_run_jobs_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let jobs = (1..=3)
            .map(|n| {
                let seen = seen.clone();
                Job::new(format!("job{}", n), Json::Null, move |_| {
                    seen.borrow_mut().push(n);
                    Ok(())
                })
            })
            .collect();
        run_jobs(&MemoryTracker::new(), jobs, &DebugLog::disabled()).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_run_jobs_stops_at_error() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let after = seen.clone();
        let jobs = vec![
            Job::new("bad", Json::Null, |_| Err(eyre::eyre!("boom"))),
            Job::new("never", Json::Null, move |_| {
                after.borrow_mut().push(1);
                Ok(())
            }),
        ];
        let err = run_jobs(&MemoryTracker::new(), jobs, &DebugLog::disabled()).unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
        assert!(seen.borrow().is_empty());
    }
}
