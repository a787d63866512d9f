//! Tracker task records

use serde_json::Value as Json;
use tracing::debug;

use crate::annotation::Annotation;
use crate::deferred::random_uuid;
use crate::document::{Document, Field, Schema};
use crate::error::DocError;
use crate::list::List;
use crate::scalar::{Int, Text, Uuid};
use crate::value::{Typed, Value, ValueKind};

/// Field table for tasks, including the workflow UDAs the hooks use
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSchema;

impl Schema for TaskSchema {
    const NAME: &'static str = "Task";
    const FIELDS: &'static [Field] = &[
        Field::new("annotations", ValueKind::Annotations),
        Field::new("blocks", ValueKind::Text),
        Field::with_parser("depends", ValueKind::UuidList, parse_depends),
        Field::new("description", ValueKind::Text),
        Field::new("due", ValueKind::Date),
        Field::new("dueRandomDelay", ValueKind::Duration),
        Field::new("end", ValueKind::Date),
        Field::new("entry", ValueKind::Date),
        Field::new("id", ValueKind::Int),
        Field::new("imask", ValueKind::Number),
        Field::new("last", ValueKind::Number),
        Field::new("mask", ValueKind::Text),
        Field::new("modified", ValueKind::Date),
        Field::new("parent", ValueKind::Uuid),
        Field::new("priority", ValueKind::Text),
        Field::new("problems", ValueKind::Text),
        Field::new("project", ValueKind::Text),
        Field::new("recur", ValueKind::Text),
        Field::new("recurAfterDue", ValueKind::Duration),
        Field::new("recurAfterDueRandomDelay", ValueKind::Duration),
        Field::new("recurAfterDueRoundDown", ValueKind::Text),
        Field::new("recurAfterModifications", ValueKind::Text),
        Field::new("recurAfterWait", ValueKind::Duration),
        Field::new("recurAfterWaitRandomDelay", ValueKind::Duration),
        Field::new("recurAfterWaitRoundDown", ValueKind::Text),
        Field::new("recurTaskUntil", ValueKind::Duration),
        Field::new("recurrence", ValueKind::Text),
        Field::new("reviewed", ValueKind::Date),
        Field::new("rtype", ValueKind::Text),
        Field::new("scheduled", ValueKind::Date),
        Field::new("source", ValueKind::Text),
        Field::new("start", ValueKind::Date),
        Field::new("status", ValueKind::Text),
        Field::new("tags", ValueKind::TextList),
        Field::new("template", ValueKind::Uuid),
        Field::new("until", ValueKind::Date),
        Field::new("urgency", ValueKind::Float),
        Field::new("uuid", ValueKind::Uuid),
        Field::new("wait", ValueKind::Date),
        Field::new("waitRandomDelay", ValueKind::Duration),
    ];
    const REQUIRED: &'static [&'static str] = &["description"];
    const FALLBACK: Option<ValueKind> = Some(ValueKind::Any);
    const IMMUTABLE: Option<&'static str> = Some("uuid");
}

/// Older tracker versions export dependencies as one comma-separated string
fn parse_depends(json: &Json) -> Result<Value, DocError> {
    match json {
        Json::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<Uuid>)
            .collect::<Result<List<Uuid>, _>>()
            .map(Value::UuidList),
        other => List::<Uuid>::parse(other).map(Value::UuidList),
    }
}

/// A tracker task
pub type Task = Document<TaskSchema>;

/// A list of tracker tasks, as produced by `task export`
pub type TaskList = List<Task>;

/// Fields cleared when a duplicate should look like a freshly added task
const RESET_AS_NEW: &[&str] = &[
    "depends", "end", "entry", "id", "modified", "reviewed", "start", "status", "urgency", "uuid",
];

/// Which fields [`Task::duplicate`] clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateOptions {
    pub reset_as_new: bool,
    pub reset_id: bool,
    pub reset_uuid: bool,
    pub reset_deps: bool,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            reset_as_new: true,
            reset_id: true,
            reset_uuid: true,
            reset_deps: true,
        }
    }
}

impl DuplicateOptions {
    /// Clear nothing
    pub fn keep_all() -> Self {
        Self {
            reset_as_new: false,
            reset_id: false,
            reset_uuid: false,
            reset_deps: false,
        }
    }
}

impl Document<TaskSchema> {
    /// Generate a random UUID the first time one is needed, unless the task already has one
    pub fn with_generated_uuid(self) -> Self {
        self.with_generated_id(random_uuid)
    }

    /// Deep copy with a subset of fields cleared
    ///
    /// `reset_as_new` requires resetting the id, uuid and dependencies too;
    /// asking for it without them is a contract violation and nothing is copied.
    pub fn duplicate(&self, options: DuplicateOptions) -> Result<Self, DocError> {
        debug!(?options, "Task::duplicate: called");
        if options.reset_as_new && !(options.reset_id && options.reset_uuid && options.reset_deps) {
            return Err(DocError::ContractViolation(
                "must reset id, uuid and dependencies when resetting as a new task".to_string(),
            ));
        }

        let mut new = self.clone();
        let keys: Vec<&str> = if options.reset_as_new {
            RESET_AS_NEW.to_vec()
        } else {
            [
                (options.reset_id, "id"),
                (options.reset_uuid, "uuid"),
                (options.reset_deps, "depends"),
            ]
            .into_iter()
            .filter_map(|(reset, key)| reset.then_some(key))
            .collect()
        };
        for key in keys {
            new.remove(key);
        }
        new.install_placeholder();
        Ok(new)
    }

    /// The task's UUID, generating it now if it was deferred
    pub fn uuid(&mut self) -> Result<Uuid, DocError> {
        if matches!(self.get_opt("uuid"), Some(Value::Deferred(_))) {
            self.resolve();
        }
        self.get_typed::<Uuid>("uuid").copied()
    }

    /// The task's UUID if it already has a real one
    pub fn uuid_opt(&self) -> Option<Uuid> {
        match self.get_opt("uuid") {
            Some(Value::Uuid(u)) => Some(*u),
            _ => None,
        }
    }

    /// Current tags; empty if the field is absent
    pub fn tags(&self) -> &[Text] {
        match self.get_opt("tags") {
            Some(Value::TextList(tags)) => &tags[..],
            _ => &[],
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    /// Add tags that are not already present, creating the field if needed
    pub fn tag<I, T>(&mut self, tags: I) -> Result<(), DocError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Text>,
    {
        let mut current = self.get_typed_or("tags", List::<Text>::new())?;
        for tag in tags {
            let tag = tag.into();
            if !current.contains(&tag) {
                current.push(tag);
            }
        }
        if !current.is_empty() {
            self.put("tags".to_string(), Value::TextList(current));
        }
        Ok(())
    }

    /// Remove tags, dropping the field once it is empty
    ///
    /// Every requested tag must be present or nothing changes. Removing no
    /// tags from a task without tags is a no-op.
    pub fn untag<I, T>(&mut self, tags: I) -> Result<(), DocError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Text>,
    {
        let mut current = self.get_typed_or("tags", List::<Text>::new())?;
        let mut requested = false;
        for tag in tags {
            requested = true;
            let tag = tag.into();
            current
                .remove(tag.clone())
                .map_err(|_| DocError::NoSuchTag(tag.into_string()))?;
        }
        if !requested {
            return Ok(());
        }
        if current.is_empty() {
            self.remove("tags");
        } else {
            self.put("tags".to_string(), Value::TextList(current));
        }
        Ok(())
    }

    /// Append to the dependency list, creating it if needed
    pub fn add_dependency<I, U>(&mut self, uuids: I) -> Result<(), DocError>
    where
        I: IntoIterator<Item = U>,
        U: Into<Uuid>,
    {
        let mut depends = self.get_typed_or("depends", List::<Uuid>::new())?;
        depends.extend(uuids);
        self.put("depends".to_string(), Value::UuidList(depends));
        Ok(())
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<(), DocError> {
        match self.get_typed_mut::<List<Annotation>>("annotations") {
            Ok(list) => list.push(annotation),
            Err(DocError::KeyNotFound(_)) => {
                self.put("annotations".to_string(), Value::Annotations(vec![annotation].into()));
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Short label for feedback messages: numeric id or short uuid, then the quoted description
    pub fn describe(&self) -> String {
        let description = self
            .get_typed_opt::<Text>("description")
            .ok()
            .flatten()
            .map(Text::as_str)
            .unwrap_or_default();
        let quoted = quote(description);

        let id = self.get_typed_opt::<Int>("id").ok().flatten().map(|i| i.get()).unwrap_or(0);
        if id != 0 {
            return format!("{} {}", id, quoted);
        }
        match self.uuid_opt() {
            Some(uuid) => format!("{} {}", uuid.short(), quoted),
            None => quoted,
        }
    }
}

/// Single-quote a string with backslash escapes, or double-quote it when it contains only single quotes
fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

impl List<Task> {
    /// Find the task with this working-set id
    pub fn by_id(&self, id: i64) -> Result<&Task, DocError> {
        if id <= 0 {
            return Err(DocError::ContractViolation("task id must be greater than 0".to_string()));
        }
        self.iter()
            .find(|t| matches!(t.get_opt("id"), Some(Value::Int(i)) if i.get() == id))
            .ok_or_else(|| DocError::NoSuchTask(format!("id {}", id)))
    }

    pub fn by_uuid(&self, uuid: impl Into<Uuid>) -> Result<&Task, DocError> {
        let uuid = uuid.into();
        self.iter()
            .find(|t| t.uuid_opt() == Some(uuid))
            .ok_or_else(|| DocError::NoSuchTask(format!("uuid {}", uuid)))
    }
}
