//! Policies for recurring tasks
//!
//! `recur-after` creates the next task only once the current one is done,
//! unlike the tracker's own recurrence which runs on a fixed schedule. The
//! `fix-*` policies correct instances the tracker generates from a recurring
//! template.

use chrono::{Datelike, TimeDelta, Timelike, Weekday};
use eyre::{Result, eyre};
use serde_json::{Map, Value as Json};
use taskjson::{Date, DuplicateOptions, Duration, Task, Text, Uuid, ValueKind};
use tracing::{debug, info};

use super::{date_opt, iso, local_midnight, local_time, status, with_local_hour};
use crate::hook::{HookOutcome, Job};
use crate::tracker::Tracker;

/// Namespace for the UUIDs of follow-up tasks, so completing the same task
/// twice only ever creates one follow-up
pub const RECUR_AFTER_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x3d963a36_2867_4629_a7ae_79533dd8bb2a);

/// Recurrence names the tracker treats as whole numbers of days
const WHOLE_DAY_RECURRENCES: &[&str] = &[
    "annual",
    "biannual",
    "bimonthly",
    "biweekly",
    "biyearly",
    "daily",
    "day",
    "fortnight",
    "monthly",
    "month",
    "mth",
    "mo",
    "quarterly",
    "quarter",
    "qrtr",
    "qtr",
    "semiannual",
    "weekdays",
    "weekly",
    "week",
    "wk",
    "yearly",
    "year",
    "yr",
];

/// Largest correction the DST fixes make before giving up
const MAX_DST_SHIFT: i64 = 3600;

/// How one date of the follow-up task is derived
struct FollowUpDate {
    field: &'static str,
    delay: &'static str,
    random_delay: &'static str,
    round_down: &'static str,
    label: &'static str,
}

const FOLLOW_UP_DATES: &[FollowUpDate] = &[
    FollowUpDate {
        field: "wait",
        delay: "recurAfterWait",
        random_delay: "recurAfterWaitRandomDelay",
        round_down: "recurAfterWaitRoundDown",
        label: "waiting until",
    },
    FollowUpDate {
        field: "due",
        delay: "recurAfterDue",
        random_delay: "recurAfterDueRandomDelay",
        round_down: "recurAfterDueRoundDown",
        label: "due",
    },
];

/// One field edit from `recurAfterModifications`
#[derive(Debug, PartialEq)]
enum FieldEdit {
    Set(Json),
    /// A date the tracker has to evaluate, like `eom` or `now + 3d`
    Calc(String),
    Delete,
}

/// Edits applied to a follow-up task, from the `recurAfterModifications` UDA
#[derive(Debug, Default, PartialEq)]
pub struct Modifications {
    add_tags: Vec<String>,
    remove_tags: Vec<String>,
    fields: Vec<(String, FieldEdit)>,
}

impl Modifications {
    /// Parse and type-check a JSON object of field edits
    ///
    /// Strings for date fields that aren't timestamps are kept for the
    /// tracker to evaluate when the edits are applied.
    pub fn parse(raw: &str) -> Result<Self> {
        let map: Map<String, Json> = serde_json::from_str(raw)?;
        let mut mods = Self::default();
        let mut scratch = Task::new();
        for (key, value) in map {
            match key.as_str() {
                "addTags" => mods.add_tags = serde_json::from_value(value)?,
                "removeTags" => mods.remove_tags = serde_json::from_value(value)?,
                _ if value.is_null() => mods.fields.push((key, FieldEdit::Delete)),
                _ => match scratch.set_json(key.as_str(), &value) {
                    Ok(()) => mods.fields.push((key, FieldEdit::Set(value))),
                    Err(e) => {
                        let is_date = Task::kind_of(&key).ok() == Some(ValueKind::Date);
                        match value {
                            Json::String(expr) if is_date => mods.fields.push((key, FieldEdit::Calc(expr))),
                            _ => return Err(e.into()),
                        }
                    }
                },
            }
        }
        Ok(mods)
    }

    pub fn apply(&self, tracker: &dyn Tracker, task: &mut Task) -> Result<()> {
        if !self.add_tags.is_empty() {
            task.tag(&self.add_tags)?;
        }
        if !self.remove_tags.is_empty() {
            task.untag(&self.remove_tags)?;
        }
        for (key, edit) in &self.fields {
            match edit {
                FieldEdit::Set(json) => task.set_json(key.as_str(), json)?,
                FieldEdit::Calc(expr) => {
                    let date = tracker.resolve_date(expr)?;
                    debug!(key = key.as_str(), expr = expr.as_str(), %date, "Modifications::apply: evaluated");
                    task.set(key.as_str(), date)?;
                }
                FieldEdit::Delete => {
                    task.remove(key);
                }
            }
        }
        Ok(())
    }
}

fn round_down_to_day(task: &Task, key: &str) -> Result<bool> {
    match task.get_typed_opt::<Text>(key)?.map(Text::as_str) {
        None => Ok(false),
        Some("P1D") => Ok(true),
        Some(other) => Err(eyre!("Could not parse {} value '{}'", key, other)),
    }
}

/// Queue a follow-up task when a task with `recurAfterWait` or `recurAfterDue` is completed
pub fn recur_after(tracker: &dyn Tracker, mut task: Task, orig: Option<&Task>) -> Result<HookOutcome> {
    if status(&task)? != Some("completed") {
        return Ok(HookOutcome::unchanged(task));
    }
    if let Some(orig) = orig {
        if status(orig)? == Some("completed") {
            return Ok(HookOutcome::unchanged(task));
        }
    }
    let has_delay = FOLLOW_UP_DATES.iter().any(|d| task.contains(d.delay));
    if !has_delay {
        return Ok(HookOutcome::unchanged(task));
    }

    let end = date_opt(&task, "end")?.ok_or_else(|| eyre!("Completed task {} has no end date", task.describe()))?;
    let mut new_task = task.duplicate(DuplicateOptions::default())?;
    let description = task
        .get_typed_opt::<Text>("description")?
        .map(Text::to_string)
        .unwrap_or_default();
    let mut parts = vec![format!("Creating new task {}", description)];

    for follow_up in FOLLOW_UP_DATES {
        let Some(delay) = task.get_typed_opt::<Duration>(follow_up.delay)?.copied() else {
            continue;
        };
        let mut date = end.checked_add(delay)?;
        if round_down_to_day(&task, follow_up.round_down)? {
            let midnight: Date = local_midnight(date)?.into();
            date = if follow_up.field == "due" {
                midnight.checked_sub(Duration::from_seconds(1))?
            } else {
                midnight
            };
        }
        new_task.set(follow_up.field, date)?;
        if let Some(random) = task.get_typed_opt::<Duration>(follow_up.random_delay)?.copied() {
            new_task.set(format!("{}RandomDelay", follow_up.field), random)?;
        }
        parts.push(format!("{} {}", follow_up.label, iso(date)));
    }

    let old_uuid = task.uuid()?;
    new_task.set("uuid", Uuid::new_v5(&RECUR_AFTER_NAMESPACE, &old_uuid.to_string()))?;

    if let Some(raw) = task.get_typed_opt::<Text>("recurAfterModifications")? {
        let mods = match Modifications::parse(raw.as_str()) {
            Ok(mods) => mods,
            Err(e) => {
                return Ok(HookOutcome::failure(format!(
                    "Failed to parse recurAfterModifications: {}",
                    e
                )));
            }
        };
        if let Err(e) = mods.apply(tracker, &mut new_task) {
            return Ok(HookOutcome::failure(format!(
                "Failed to apply recurAfterModifications: {}",
                e
            )));
        }
    }

    info!(%old_uuid, "recur_after: queueing follow-up task");
    let job = Job::import(vec![new_task])?;
    Ok(HookOutcome::with_feedback(task, parts.join(", ")).and_job(job))
}

/// True if a recurrence period is a whole number of days
pub fn recurrence_is_whole_days(tracker: &dyn Tracker, recur: &str) -> Result<bool> {
    if WHOLE_DAY_RECURRENCES.contains(&recur) {
        return Ok(true);
    }
    if recur.starts_with('P') && !recur.contains('T') {
        return Ok(true);
    }
    let period = tracker.calc(recur)?;
    if !period.starts_with('P') {
        return Err(eyre!("Recurrence '{}' evaluated to '{}', not a duration", recur, period));
    }
    Ok(!period.contains('T'))
}

fn local_clock(date: Date) -> String {
    date.local().format("%H:%M:%S").to_string()
}

/// Keep instances of whole-day recurrences at the parent's local hour
///
/// Instances are generated a whole number of days after the parent in UTC,
/// so across a DST change they drift by an hour in local time.
pub fn fix_recurrence_dst(tracker: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    let Some(parent_uuid) = task.get_typed_opt::<Uuid>("parent")?.copied() else {
        return Ok(HookOutcome::unchanged(task));
    };
    let Some(recur) = task.get_typed_opt::<Text>("recur")?.map(Text::to_string) else {
        return Ok(HookOutcome::unchanged(task));
    };
    if !recurrence_is_whole_days(tracker, &recur)? {
        return Ok(HookOutcome::unchanged(task));
    }

    let parent = tracker.get_task(parent_uuid)?;
    let description = task.describe();
    let mut changes = Vec::new();

    for field in ["due", "wait"] {
        let (Some(parent_date), Some(child_date)) = (date_opt(&parent, field)?, date_opt(&task, field)?) else {
            continue;
        };
        let fixed: Date = with_local_hour(child_date, parent_date.local().hour())?.into();
        if fixed == child_date {
            continue;
        }
        if (child_date - fixed).as_seconds().abs() > MAX_DST_SHIFT {
            return Ok(HookOutcome::failure(format!(
                "Task {} {} would move from {} to {}, more than a DST change",
                description,
                field,
                iso(child_date),
                iso(fixed)
            )));
        }
        debug!(field, from = %child_date, to = %fixed, "fix_recurrence_dst: correcting");
        task.set(field, fixed)?;
        changes.push(format!("{} {} -> {}", field, local_clock(child_date), local_clock(fixed)));
    }

    if changes.is_empty() {
        return Ok(HookOutcome::unchanged(task));
    }
    let message = format!("Task {} DST fixes: {}", description, changes.join(", "));
    Ok(HookOutcome::with_feedback(task, message))
}

fn days_earlier(date: Date, days: i64) -> Result<Date> {
    let earlier = date
        .local()
        .naive_local()
        .checked_sub_signed(TimeDelta::days(days))
        .ok_or_else(|| eyre!("{} minus {} days is out of range", iso(date), days))?;
    Ok(local_time(earlier)?.into())
}

/// Move weekday instances due at the end of Sunday back to the end of Friday
///
/// The tracker creates weekday instances due at midnight Monday to Friday,
/// which `due-end-of` turns into 23:59:59 Sunday to Thursday.
pub fn fix_weekday_due(_: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    // The tracker keeps the period in `recur`; `recurrence` is honoured for
    // tasks imported by older tooling that wrote it under that name
    let mut weekdays = false;
    for field in ["recur", "recurrence"] {
        weekdays |= task.get_typed_opt::<Text>(field)?.map(Text::as_str) == Some("weekdays");
    }
    if !task.contains("parent") || !weekdays {
        return Ok(HookOutcome::unchanged(task));
    }
    let due = date_opt(&task, "due")?.ok_or_else(|| eyre!("Weekday recurrence {} has no due date", task.describe()))?;
    let local = due.local();

    if local.weekday().number_from_monday() <= Weekday::Fri.number_from_monday() {
        return Ok(HookOutcome::unchanged(task));
    }

    if local.weekday() == Weekday::Sun && (local.hour(), local.minute(), local.second()) == (23, 59, 59) {
        task.set("due", days_earlier(due, 2)?)?;
        if let Some(wait) = date_opt(&task, "wait")? {
            task.set("wait", days_earlier(wait, 2)?)?;
        }
        let message = format!("Corrected {} dates to fix weekday recurrence", task.describe());
        return Ok(HookOutcome::with_feedback(task, message));
    }

    Ok(HookOutcome::failure(format!(
        "Not sure how to handle this due date for weekday recurrence: {}",
        iso(due)
    )))
}
