//! TaskJson - typed documents for Taskwarrior's JSON task records
//!
//! Parses one exported task record into schema-checked fields, lets callers
//! read and mutate them through typed accessors, and serializes back to the
//! exact form `task import` expects.
//!
//! # Example
//!
//! ```ignore
//! use taskjson::{Task, Text};
//!
//! let mut task = Task::from_json_str(r#"{"description": "buy milk"}"#)?.with_generated_uuid();
//! task.tag(["inbox"])?;
//! println!("{}", task.to_json_string()?);
//! ```

pub mod annotation;
pub mod date;
pub mod deferred;
pub mod document;
pub mod duration;
pub mod error;
pub mod list;
pub mod problem;
pub mod scalar;
pub mod task;
pub mod value;

pub use annotation::{Annotation, AnnotationSchema};
pub use date::Date;
pub use deferred::{DeferredUuid, IdFactory, random_uuid};
pub use document::{Document, Field, FieldParser, Schema};
pub use duration::Duration;
pub use error::DocError;
pub use list::List;
pub use problem::{ProblemChange, TaskProblem};
pub use scalar::{AnyJson, Float, Int, Number, Text, Uuid};
pub use task::{DuplicateOptions, Task, TaskList, TaskSchema};
pub use value::{Stored, Typed, Value, ValueKind};
