//! Policies that adjust a task's own dates

use chrono::NaiveTime;
use eyre::Result;
use rand::Rng;
use taskjson::{Duration, Task};
use tracing::debug;

use super::{date_opt, iso, status};
use crate::hook::HookOutcome;
use crate::tracker::Tracker;

/// Date fields paired with the UDA holding their random delay
const RANDOM_DELAYS: &[(&str, &str)] = &[("due", "dueRandomDelay"), ("wait", "waitRandomDelay")];

/// Tasks due at local midnight really mean the end of the previous day
pub fn due_end_of(_: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    // Recurring templates are fixed up when their instances are created, and
    // the due date of a deleted task no longer matters
    if matches!(status(&task)?, Some("recurring" | "deleted")) {
        return Ok(HookOutcome::unchanged(task));
    }

    if let Some(due) = date_opt(&task, "due")? {
        if due.local().time() == NaiveTime::MIN {
            debug!(%due, "due_end_of: moving midnight due back one second");
            task.set("due", due.checked_sub(Duration::from_seconds(1))?)?;
        }
    }
    Ok(HookOutcome::unchanged(task))
}

/// Tasks never reviewed count as reviewed when they were entered
pub fn reviewed_to_entry(_: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    let Some(entry) = date_opt(&task, "entry")? else {
        return Ok(HookOutcome::unchanged(task));
    };
    match date_opt(&task, "reviewed")? {
        Some(reviewed) if reviewed >= entry => {}
        _ => task.set("reviewed", entry)?,
    }
    Ok(HookOutcome::unchanged(task))
}

pub fn waitingfor_adds_due(_: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    if status(&task)? != Some("pending") || !task.has_tag("waitingfor") || task.contains("due") {
        return Ok(HookOutcome::unchanged(task));
    }
    let Some(entry) = date_opt(&task, "entry")? else {
        return Ok(HookOutcome::unchanged(task));
    };
    task.set("due", entry)?;
    let message = format!("Due date added to undue {}", task.describe());
    Ok(HookOutcome::with_feedback(task, message))
}

/// Recurring instances expire `recurTaskUntil` after they are due
pub fn child_until(_: &dyn Tracker, mut task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    if status(&task)? == Some("recurring") {
        return Ok(HookOutcome::unchanged(task));
    }
    let Some(lifetime) = task.get_typed_opt::<Duration>("recurTaskUntil")?.copied() else {
        return Ok(HookOutcome::unchanged(task));
    };
    let Some(due) = date_opt(&task, "due")? else {
        let uuid = task.uuid_opt().map(|u| u.to_string()).unwrap_or_default();
        return Ok(HookOutcome::failure(format!("Task {} has recurTaskUntil but no due", uuid)));
    };

    let old_until = date_opt(&task, "until")?;
    let new_until = due.checked_add(lifetime)?;
    task.set("until", new_until)?;

    let description = description(&task)?;
    let message = match old_until {
        None => Some(format!("Task {} expires {}", description, iso(new_until))),
        Some(old) if old == new_until => None,
        Some(old) => Some(format!(
            "Task {} did expire {}, now expires {}",
            description,
            iso(old),
            iso(new_until)
        )),
    };
    Ok(match message {
        Some(message) => HookOutcome::with_feedback(task, message),
        None => HookOutcome::unchanged(task),
    })
}

/// Spread due and wait times out by a random amount
pub fn random_delay(_: &dyn Tracker, task: Task, _: Option<&Task>) -> Result<HookOutcome> {
    let task = apply_random_delays(&mut rand::rng(), task)?;
    Ok(HookOutcome::unchanged(task))
}

/// Add up to the configured delay to each date, then drop the delay fields
pub fn apply_random_delays<R: Rng + ?Sized>(rng: &mut R, mut task: Task) -> Result<Task> {
    for (date_key, delay_key) in RANDOM_DELAYS {
        let Some(delay) = task.get_typed_opt::<Duration>(delay_key)?.copied() else {
            continue;
        };
        task.remove(delay_key);

        let Some(date) = date_opt(&task, date_key)? else {
            continue;
        };
        if delay.as_seconds() <= 0 {
            continue;
        }
        let offset = Duration::from_seconds(rng.random_range(0..=delay.as_seconds()));
        debug!(field = date_key, %offset, "apply_random_delays: shifting");
        task.set(*date_key, date.checked_add(offset)?)?;
    }
    Ok(task)
}

fn description(task: &Task) -> Result<String> {
    Ok(task
        .get_typed_opt::<taskjson::Text>("description")?
        .map(|d| d.to_string())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::local_date;
    use crate::tracker::MemoryTracker;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use taskjson::Date;

    fn task(pairs: Vec<(&str, taskjson::Value)>) -> Task {
        Task::from_pairs(pairs).unwrap()
    }

    fn run(policy: fn(&dyn Tracker, Task, Option<&Task>) -> Result<HookOutcome>, t: Task) -> (Option<Task>, Option<String>) {
        match policy(&MemoryTracker::new(), t, None).unwrap() {
            HookOutcome::Success { task, feedback, .. } => (Some(task), feedback),
            HookOutcome::Failure { message, .. } => (None, Some(message)),
        }
    }

    fn date(t: &Task, key: &str) -> Option<Date> {
        date_opt(t, key).unwrap()
    }

    #[test]
    fn test_due_end_of_moves_midnight() {
        let t = task(vec![
            ("description", "d".into()),
            ("status", "pending".into()),
            ("due", local_date(2024, 3, 6, 0, 0, 0).into()),
        ]);
        let (t, feedback) = run(due_end_of, t);
        assert_eq!(date(&t.unwrap(), "due"), Some(local_date(2024, 3, 5, 23, 59, 59)));
        assert!(feedback.is_none());
    }

    #[test]
    fn test_due_end_of_leaves_other_times() {
        let due = local_date(2024, 3, 6, 0, 0, 1);
        let t = task(vec![("description", "d".into()), ("due", due.into())]);
        let (t, _) = run(due_end_of, t);
        assert_eq!(date(&t.unwrap(), "due"), Some(due));
    }

    #[test]
    fn test_due_end_of_skips_recurring_and_deleted() {
        for status in ["recurring", "deleted"] {
            let due = local_date(2024, 3, 6, 0, 0, 0);
            let t = task(vec![
                ("description", "d".into()),
                ("status", status.into()),
                ("due", due.into()),
            ]);
            let (t, _) = run(due_end_of, t);
            assert_eq!(date(&t.unwrap(), "due"), Some(due));
        }
    }

    #[test]
    fn test_reviewed_to_entry() {
        let entry = local_date(2024, 1, 2, 9, 0, 0);
        let t = task(vec![("description", "d".into()), ("entry", entry.into())]);
        let (t, _) = run(reviewed_to_entry, t);
        assert_eq!(date(&t.unwrap(), "reviewed"), Some(entry));

        let stale = local_date(2023, 1, 1, 0, 0, 0);
        let t = task(vec![
            ("description", "d".into()),
            ("entry", entry.into()),
            ("reviewed", stale.into()),
        ]);
        let (t, _) = run(reviewed_to_entry, t);
        assert_eq!(date(&t.unwrap(), "reviewed"), Some(entry));

        let fresh = local_date(2024, 6, 1, 0, 0, 0);
        let t = task(vec![
            ("description", "d".into()),
            ("entry", entry.into()),
            ("reviewed", fresh.into()),
        ]);
        let (t, _) = run(reviewed_to_entry, t);
        assert_eq!(date(&t.unwrap(), "reviewed"), Some(fresh));
    }

    #[test]
    fn test_waitingfor_adds_due() {
        let entry = local_date(2024, 1, 2, 9, 0, 0);
        let mut t = task(vec![
            ("description", "reply from bob".into()),
            ("status", "pending".into()),
            ("entry", entry.into()),
        ]);
        t.tag(["waitingfor"]).unwrap();
        let (t, feedback) = run(waitingfor_adds_due, t);
        assert_eq!(date(&t.unwrap(), "due"), Some(entry));
        assert_eq!(feedback.as_deref(), Some("Due date added to undue 'reply from bob'"));
    }

    #[test]
    fn test_waitingfor_keeps_existing_due() {
        let due = local_date(2024, 2, 1, 12, 0, 0);
        let mut t = task(vec![
            ("description", "d".into()),
            ("status", "pending".into()),
            ("entry", local_date(2024, 1, 2, 9, 0, 0).into()),
            ("due", due.into()),
        ]);
        t.tag(["waitingfor"]).unwrap();
        let (t, feedback) = run(waitingfor_adds_due, t);
        assert_eq!(date(&t.unwrap(), "due"), Some(due));
        assert!(feedback.is_none());
    }

    #[test]
    fn test_child_until_sets_until() {
        let due = local_date(2024, 3, 1, 12, 0, 0);
        let t = task(vec![
            ("description", "water plants".into()),
            ("status", "pending".into()),
            ("due", due.into()),
            ("recurTaskUntil", Duration::from_days(2).into()),
        ]);
        let (t, feedback) = run(child_until, t);
        let until = local_date(2024, 3, 3, 12, 0, 0);
        assert_eq!(date(&t.unwrap(), "until"), Some(until));
        assert_eq!(feedback, Some(format!("Task water plants expires {}", iso(until))));
    }

    #[test]
    fn test_child_until_reports_change_only() {
        let due = local_date(2024, 3, 1, 12, 0, 0);
        let until = local_date(2024, 3, 3, 12, 0, 0);
        let base = vec![
            ("description", "d".into()),
            ("due", due.into()),
            ("recurTaskUntil", Duration::from_days(2).into()),
        ];

        let mut same = base.clone();
        same.push(("until", until.into()));
        let (_, feedback) = run(child_until, task(same));
        assert!(feedback.is_none());

        let old = local_date(2024, 3, 2, 12, 0, 0);
        let mut changed = base;
        changed.push(("until", old.into()));
        let (_, feedback) = run(child_until, task(changed));
        assert_eq!(
            feedback,
            Some(format!("Task d did expire {}, now expires {}", iso(old), iso(until)))
        );
    }

    #[test]
    fn test_child_until_lifetime_out_of_range_is_error() {
        let t = Task::from_json(&serde_json::json!({
            "description": "d",
            "due": "2024-01-01T00:00:00Z",
            "recurTaskUntil": "P9999999Y",
        }))
        .unwrap();
        let err = child_until(&MemoryTracker::new(), t, None).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{}", err);
    }

    #[test]
    fn test_child_until_without_due_fails() {
        let t = task(vec![
            ("description", "d".into()),
            ("uuid", "6ba7b810-9dad-11d1-80b4-00c04fd430c8".into()),
            ("recurTaskUntil", Duration::from_days(2).into()),
        ]);
        let (t, message) = run(child_until, t);
        assert!(t.is_none());
        assert_eq!(
            message.as_deref(),
            Some("Task 6ba7b810-9dad-11d1-80b4-00c04fd430c8 has recurTaskUntil but no due")
        );
    }

    #[test]
    fn test_random_delay_within_bounds() {
        let due = local_date(2024, 3, 1, 12, 0, 0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let t = task(vec![
                ("description", "d".into()),
                ("due", due.into()),
                ("dueRandomDelay", Duration::from_seconds(3600).into()),
            ]);
            let t = apply_random_delays(&mut rng, t).unwrap();
            let shifted = date(&t, "due").unwrap();
            assert!(shifted >= due && shifted <= due + Duration::from_seconds(3600));
            assert!(!t.contains("dueRandomDelay"));
        }
    }

    #[test]
    fn test_random_delay_without_date_only_drops_delay() {
        let t = task(vec![
            ("description", "d".into()),
            ("waitRandomDelay", Duration::from_days(1).into()),
        ]);
        let (t, _) = run(random_delay, t);
        let t = t.unwrap();
        assert!(!t.contains("waitRandomDelay"));
        assert!(!t.contains("wait"));
    }
}
