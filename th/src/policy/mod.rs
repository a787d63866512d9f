//! Workflow policies
//!
//! Each policy is an independent hook. The registry maps the names used in
//! the config file to hooks, so the chains can be rearranged without code
//! changes.

pub mod blocks;
pub mod dates;
pub mod recur;
pub mod tagging;

use chrono::{DateTime, Local, NaiveTime, SecondsFormat, TimeZone, Timelike};
use eyre::{Result, eyre};
use taskjson::{Date, Task, Text};
use tracing::debug;

use crate::config::Config;
use crate::hook::{FnHook, Hook};

/// Name and one-line description of a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyInfo {
    pub name: &'static str,
    pub about: &'static str,
}

/// Every policy the registry knows, in the order they are listed
pub const POLICIES: &[PolicyInfo] = &[
    PolicyInfo {
        name: "due-end-of",
        about: "Move a due time of local midnight back one second",
    },
    PolicyInfo {
        name: "reviewed-to-entry",
        about: "Treat tasks as reviewed when they were entered",
    },
    PolicyInfo {
        name: "waitingfor-adds-due",
        about: "Make pending +waitingfor tasks without a due date due now",
    },
    PolicyInfo {
        name: "child-until",
        about: "Set until from due plus recurTaskUntil",
    },
    PolicyInfo {
        name: "random-delay",
        about: "Shift due and wait by a random part of dueRandomDelay and waitRandomDelay",
    },
    PolicyInfo {
        name: "recur-after",
        about: "Queue a follow-up task when a task with recurAfterWait or recurAfterDue is completed",
    },
    PolicyInfo {
        name: "fix-recurrence-dst",
        about: "Keep recurring instances at the parent's local time across DST changes",
    },
    PolicyInfo {
        name: "fix-weekday-due",
        about: "Move weekday recurrences due late on Sunday back to Friday",
    },
    PolicyInfo {
        name: "blocks",
        about: "Make the tasks named in blocks depend on this task",
    },
    PolicyInfo {
        name: "inbox-if-untagged",
        about: "Tag tasks without tags with inbox",
    },
    PolicyInfo {
        name: "problems",
        about: "Record missing context tags or project in the problems field",
    },
];

/// Build the hook for a policy name
pub fn build(name: &str, config: &Config) -> Result<Box<dyn Hook>> {
    debug!(name, "policy::build: called");
    let hook: Box<dyn Hook> = match name {
        "due-end-of" => Box::new(FnHook::new(name, dates::due_end_of)),
        "reviewed-to-entry" => Box::new(FnHook::new(name, dates::reviewed_to_entry)),
        "waitingfor-adds-due" => Box::new(FnHook::new(name, dates::waitingfor_adds_due)),
        "child-until" => Box::new(FnHook::new(name, dates::child_until)),
        "random-delay" => Box::new(FnHook::new(name, dates::random_delay)),
        "recur-after" => Box::new(FnHook::new(name, recur::recur_after)),
        "fix-recurrence-dst" => Box::new(FnHook::new(name, recur::fix_recurrence_dst)),
        "fix-weekday-due" => Box::new(FnHook::new(name, recur::fix_weekday_due)),
        "blocks" => Box::new(FnHook::new(name, blocks::blocks)),
        "inbox-if-untagged" => Box::new(FnHook::new(name, tagging::inbox_if_untagged)),
        "problems" => Box::new(tagging::ProblemsHook::new(&config.context_tags)),
        unknown => return Err(eyre!("Unknown policy '{}'", unknown)),
    };
    Ok(hook)
}

/// Build a chain of hooks, in order
pub fn chain(names: &[String], config: &Config) -> Result<Vec<Box<dyn Hook>>> {
    names.iter().map(|name| build(name, config)).collect()
}

pub(crate) fn status(task: &Task) -> Result<Option<&str>> {
    Ok(task.get_typed_opt::<Text>("status")?.map(Text::as_str))
}

pub(crate) fn date_opt(task: &Task, key: &str) -> Result<Option<Date>> {
    Ok(task.get_typed_opt::<Date>(key)?.copied())
}

/// Resolve a local wall-clock time, taking the earlier instant when it is ambiguous
pub(crate) fn local_time(dt: chrono::NaiveDateTime) -> Result<DateTime<Local>> {
    Local
        .from_local_datetime(&dt)
        .earliest()
        .ok_or_else(|| eyre!("{} does not exist in the local timezone", dt))
}

/// Start of the local day containing `date`
pub(crate) fn local_midnight(date: Date) -> Result<DateTime<Local>> {
    local_time(date.local().date_naive().and_time(NaiveTime::MIN))
}

/// Same local day and minutes, with the hour replaced
pub(crate) fn with_local_hour(date: Date, hour: u32) -> Result<DateTime<Local>> {
    let naive = date.local().naive_local();
    let moved = naive
        .with_hour(hour)
        .ok_or_else(|| eyre!("hour {} out of range", hour))?;
    local_time(moved)
}

/// ISO-8601 with the local offset, as shown in feedback
pub(crate) fn iso(date: impl Into<Date>) -> String {
    date.into().local().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// A local wall-clock time, for tests that must not depend on `TZ`
#[cfg(test)]
pub(crate) fn local_date(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> Date {
    let naive = chrono::NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|day| day.and_hms_opt(h, mi, s))
        .unwrap();
    Date::from(local_time(naive).unwrap())
}
