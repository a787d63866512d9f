//! End-to-end tests for the th binary
//!
//! Each test writes a config into a temp dir that points logging there and
//! selects only the policies it exercises, so no real tracker is needed.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &Path, on_add: &[&str], on_modify: &[&str], extra: &str) -> PathBuf {
    let list = |names: &[&str]| {
        if names.is_empty() {
            " []".to_string()
        } else {
            names.iter().map(|n| format!("\n    - {}", n)).collect()
        }
    };
    let path = dir.join("taskhooks.yml");
    let content = format!(
        "task-command: /nonexistent/task\nlog-dir: {}\n{}hooks:\n  on-add:{}\n  on-modify:{}\n",
        dir.join("logs").display(),
        extra,
        list(on_add),
        list(on_modify),
    );
    std::fs::write(&path, content).expect("Failed to write config");
    path
}

fn th(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("th").expect("th binary exists");
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_on_add_tags_untagged_task() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["inbox-if-untagged"], &[], "");

    th(&config)
        .args(["on-add", "api:2", "command:add"])
        .write_stdin("{\"description\": \"buy milk\"}\n")
        .assert()
        .success()
        .stdout("{\"description\":\"buy milk\",\"tags\":[\"inbox\"]}\nAdded inbox tag to 'buy milk'\n");
}

#[test]
fn test_on_add_failure_sets_exit_code() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["inbox-if-untagged", "child-until"], &[], "");

    th(&config)
        .arg("on-add")
        .write_stdin(
            "{\"description\":\"d\",\"uuid\":\"6ba7b810-9dad-11d1-80b4-00c04fd430c8\",\"recurTaskUntil\":\"P2D\"}\n",
        )
        .assert()
        .failure()
        .code(1)
        .stdout("Task 6ba7b810-9dad-11d1-80b4-00c04fd430c8 has recurTaskUntil but no due\n");
}

#[test]
fn test_on_modify_empty_task_echoes_original() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &[], &["inbox-if-untagged"], "");

    th(&config)
        .arg("on-modify")
        .write_stdin("{\"description\":\"old\",\"status\":\"pending\"}\n{}\n")
        .assert()
        .success()
        .stdout("{\"description\":\"old\",\"status\":\"pending\"}\n");
}

#[test]
fn test_on_modify_runs_modify_chain() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &[], &["inbox-if-untagged"], "");

    th(&config)
        .arg("on-modify")
        .write_stdin("{\"description\":\"old\"}\n{\"description\":\"new\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "{\"description\":\"new\",\"tags\":[\"inbox\"]}\n",
        ));
}

#[test]
fn test_hook_name_selects_chain() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["inbox-if-untagged"], &[], "");
    let link = dir.path().join("on-add.th");
    std::os::unix::fs::symlink(assert_cmd::cargo::cargo_bin("th"), &link).expect("Failed to create symlink");

    Command::new(&link)
        .arg("--config")
        .arg(&config)
        .write_stdin("{\"description\":\"via link\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added inbox tag to 'via link'"));
}

#[test]
fn test_bad_input_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["inbox-if-untagged"], &[], "");

    th(&config)
        .arg("on-add")
        .write_stdin("this is not json\n")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Failed to parse added task"));
}

#[test]
fn test_unknown_policy_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["no-such-policy"], &[], "");

    th(&config)
        .arg("on-add")
        .write_stdin("{\"description\":\"d\"}\n")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Unknown policy 'no-such-policy'"));
}

#[test]
fn test_debug_log_records_hooks() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let debug_log = dir.path().join("debug.jsonl");
    let extra = format!("debug-log: {}\n", debug_log.display());
    let config = write_config(dir.path(), &["inbox-if-untagged"], &[], &extra);

    th(&config)
        .arg("on-add")
        .write_stdin("{\"description\":\"d\"}\n")
        .assert()
        .success();

    let content = std::fs::read_to_string(&debug_log).expect("debug log written");
    let events: Vec<String> = content
        .lines()
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).expect("valid JSON line");
            record["event"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(events, vec!["invoked", "on-add", "hook-result"]);
}

#[test]
fn test_policies_lists_registry_and_chains() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["inbox-if-untagged", "problems"], &["recur-after"], "");

    th(&config)
        .arg("policies")
        .assert()
        .success()
        .stdout(predicate::str::contains("fix-weekday-due"))
        .stdout(predicate::str::contains("on-add:    inbox-if-untagged, problems"))
        .stdout(predicate::str::contains("on-modify: recur-after"));
}

#[test]
fn test_out_of_range_date_arithmetic_fails_cleanly() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(dir.path(), &["child-until"], &[], "");

    th(&config)
        .arg("on-add")
        .write_stdin(
            "{\"description\":\"d\",\"due\":\"2024-01-01T00:00:00Z\",\"recurTaskUntil\":\"P9999999Y\"}\n",
        )
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::starts_with("child-until: "))
        .stdout(predicate::str::contains("out of range"));
}

/// A stand-in `task` that saves whatever `import -` is given
fn recording_task(dir: &Path, imported: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join("task");
    let body = format!(
        "#!/bin/sh\ncase \"$*\" in\n  *import*) cat > \"{0}.tmp\" && mv \"{0}.tmp\" \"{0}\" ;;\nesac\n",
        imported.display()
    );
    std::fs::write(&script, body).expect("Failed to write fake task");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("Failed to chmod fake task");
    script
}

#[test]
fn test_deferred_import_runs_after_hook_exits() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let imported = dir.path().join("imported.json");
    let task_command = recording_task(dir.path(), &imported);
    let config = write_config(dir.path(), &[], &["recur-after"], "");
    let content = std::fs::read_to_string(&config)
        .expect("config written")
        .replace("/nonexistent/task", &task_command.display().to_string());
    std::fs::write(&config, content).expect("Failed to rewrite config");

    let old_uuid = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";
    let orig = format!(
        "{{\"description\":\"water plants\",\"status\":\"pending\",\"uuid\":\"{}\",\"recurAfterWait\":\"P1D\"}}",
        old_uuid
    );
    let done = format!(
        "{{\"description\":\"water plants\",\"status\":\"completed\",\"uuid\":\"{}\",\"end\":\"2024-03-01T12:00:00Z\",\"recurAfterWait\":\"P1D\"}}",
        old_uuid
    );

    th(&config)
        .arg("on-modify")
        .write_stdin(format!("{}\n{}\n", orig, done))
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"completed\""))
        .stdout(predicate::str::contains("Creating new task water plants, waiting until "));

    // The job runs in a forked child once the hook has exited
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(20);
    while !imported.exists() && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    let json = std::fs::read_to_string(&imported).expect("follow-up task imported");
    let tasks: serde_json::Value = serde_json::from_str(&json).expect("import input is JSON");
    let tasks = tasks.as_array().expect("import input is an array");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["description"], "water plants");
    assert_eq!(tasks[0]["wait"], "2024-03-02T12:00:00Z");
    assert_ne!(tasks[0]["uuid"], old_uuid);
}
