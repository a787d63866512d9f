//! Configuration for taskhooks

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the config file looked for in the working directory
pub const LOCAL_CONFIG: &str = ".taskhooks.yml";

/// Tags that place a task in a context
pub const DEFAULT_CONTEXT_TAGS: &[&str] = &[
    "anywhere",
    "car",
    "home",
    "internet",
    "pc",
    "phone",
    "waitingfor",
    "work",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tracker executable
    #[serde(rename = "task-command", default = "default_task_command")]
    pub task_command: PathBuf,

    /// Directory for the application log
    #[serde(rename = "log-dir", default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log level when not given on the command line
    #[serde(rename = "log-level", default)]
    pub log_level: Option<String>,

    /// JSON-lines trace of hook activity; off when unset
    #[serde(rename = "debug-log", default)]
    pub debug_log: Option<PathBuf>,

    /// Tags that count as a context for the problems policy
    #[serde(rename = "context-tags", default = "default_context_tags")]
    pub context_tags: Vec<String>,

    #[serde(default)]
    pub hooks: HooksConfig,
}

/// Policy chains, by name, in the order they run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    #[serde(rename = "on-add", default = "default_on_add")]
    pub on_add: Vec<String>,

    #[serde(rename = "on-modify", default = "default_on_modify")]
    pub on_modify: Vec<String>,
}

fn default_task_command() -> PathBuf {
    PathBuf::from("task")
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskhooks")
        .join("logs")
}

fn default_context_tags() -> Vec<String> {
    DEFAULT_CONTEXT_TAGS.iter().map(|s| s.to_string()).collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_on_add() -> Vec<String> {
    names(&[
        "due-end-of",
        "fix-recurrence-dst",
        "fix-weekday-due",
        "random-delay",
        "child-until",
        "waitingfor-adds-due",
        "reviewed-to-entry",
        "blocks",
        "inbox-if-untagged",
        "problems",
    ])
}

fn default_on_modify() -> Vec<String> {
    names(&[
        "due-end-of",
        "child-until",
        "waitingfor-adds-due",
        "recur-after",
        "blocks",
        "problems",
    ])
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            on_add: default_on_add(),
            on_modify: default_on_modify(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            task_command: default_task_command(),
            log_dir: default_log_dir(),
            log_level: None,
            debug_log: None,
            context_tags: default_context_tags(),
            hooks: HooksConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    ///
    /// An explicit path must exist. Otherwise the first of `./.taskhooks.yml`
    /// and `<config dir>/taskhooks/taskhooks.yml` that exists is used.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            debug!(path = %config_path.display(), "Config::load: explicit path");
            return Self::load_file(config_path);
        }

        let default_paths = [
            Some(PathBuf::from(LOCAL_CONFIG)),
            dirs::config_dir().map(|p| p.join("taskhooks").join("taskhooks.yml")),
        ];
        Self::load_first(default_paths.iter().flatten())
    }

    /// Load the first existing file among `candidates`, or defaults if none exist
    pub fn load_first<'a>(candidates: impl IntoIterator<Item = &'a PathBuf>) -> Result<Self> {
        for path in candidates {
            if path.exists() {
                debug!(path = %path.display(), "Config::load_first: found config");
                return Self::load_file(path);
            }
        }
        debug!("Config::load_first: no config file, using defaults");
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.task_command, PathBuf::from("task"));
        assert!(config.debug_log.is_none());
        assert!(config.hooks.on_add.contains(&"inbox-if-untagged".to_string()));
        assert!(config.hooks.on_modify.contains(&"recur-after".to_string()));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taskhooks.yml");
        std::fs::write(
            &path,
            "task-command: /usr/local/bin/task\nhooks:\n  on-add:\n    - inbox-if-untagged\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.task_command, PathBuf::from("/usr/local/bin/task"));
        assert_eq!(config.hooks.on_add, vec!["inbox-if-untagged"]);
        assert_eq!(config.hooks.on_modify, default_on_modify());
        assert_eq!(config.context_tags, default_context_tags());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.yml"))).is_err());
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yml");
        let second = dir.path().join("second.yml");
        std::fs::write(&second, "debug-log: /tmp/th-debug.jsonl\n").unwrap();

        let config = Config::load_first([&missing, &second]).unwrap();
        assert_eq!(config.debug_log, Some(PathBuf::from("/tmp/th-debug.jsonl")));
    }

    #[test]
    fn test_no_candidates_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yml");
        let config = Config::load_first([&missing]).unwrap();
        assert_eq!(config.context_tags, default_context_tags());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "context-tags: [unclosed\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
