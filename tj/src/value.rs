//! Typed values
//!
//! Every field of a document is held as a [`Value`], one variant per wrapper
//! type. Wrappers implement [`Typed`] (parse from and serialize to the
//! tracker's JSON form) and [`Stored`] (borrow out of a [`Value`]).

use std::fmt;

use serde_json::Value as Json;
use tracing::debug;

use crate::annotation::Annotation;
use crate::date::Date;
use crate::deferred::DeferredUuid;
use crate::duration::Duration;
use crate::error::DocError;
use crate::list::List;
use crate::scalar::{AnyJson, Float, Int, Number, Text, Uuid};

/// Runtime kind of a typed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Int,
    Float,
    Number,
    Date,
    Duration,
    Uuid,
    TextList,
    UuidList,
    Annotations,
    Document,
    Any,
    Deferred,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "string",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::Date => "date",
            Self::Duration => "duration",
            Self::Uuid => "uuid",
            Self::TextList => "string list",
            Self::UuidList => "uuid list",
            Self::Annotations => "annotation list",
            Self::Document => "document",
            Self::Any => "json",
            Self::Deferred => "deferred uuid",
        };
        write!(f, "{}", name)
    }
}

/// A value that round-trips through the tracker's JSON representation
pub trait Typed: Clone + fmt::Debug + PartialEq + Sized {
    /// Kind reported for this wrapper
    const KIND: ValueKind;

    /// Kind of a homogeneous list of this wrapper, if such a list can be stored in a document
    const LIST_KIND: Option<ValueKind> = None;

    /// Parse from a JSON value, failing if its shape or content doesn't fit
    fn parse(json: &Json) -> Result<Self, DocError>;

    /// Serialize to the canonical on-wire JSON form
    fn serialize(&self) -> Result<Json, DocError>;
}

/// A wrapper that can be borrowed out of a [`Value`]
pub trait Stored: Typed {
    fn from_value(value: &Value) -> Option<&Self>;
    fn from_value_mut(value: &mut Value) -> Option<&mut Self>;
    fn into_value(self) -> Value;
}

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Text),
    Int(Int),
    Float(Float),
    Number(Number),
    Date(Date),
    Duration(Duration),
    Uuid(Uuid),
    TextList(List<Text>),
    UuidList(List<Uuid>),
    Annotations(List<Annotation>),
    Any(AnyJson),
    Deferred(DeferredUuid),
}

impl Value {
    /// Runtime kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Number(_) => ValueKind::Number,
            Self::Date(_) => ValueKind::Date,
            Self::Duration(_) => ValueKind::Duration,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::TextList(_) => ValueKind::TextList,
            Self::UuidList(_) => ValueKind::UuidList,
            Self::Annotations(_) => ValueKind::Annotations,
            Self::Any(_) => ValueKind::Any,
            Self::Deferred(_) => ValueKind::Deferred,
        }
    }

    /// Parse a JSON value as the given kind
    pub fn parse(kind: ValueKind, json: &Json) -> Result<Self, DocError> {
        debug!(%kind, "Value::parse: called");
        let value = match kind {
            ValueKind::Text => Self::Text(Text::parse(json)?),
            ValueKind::Int => Self::Int(Int::parse(json)?),
            ValueKind::Float => Self::Float(Float::parse(json)?),
            ValueKind::Number => Self::Number(Number::parse(json)?),
            ValueKind::Date => Self::Date(Date::parse(json)?),
            ValueKind::Duration => Self::Duration(Duration::parse(json)?),
            ValueKind::Uuid => Self::Uuid(Uuid::parse(json)?),
            ValueKind::TextList => Self::TextList(List::parse(json)?),
            ValueKind::UuidList => Self::UuidList(List::parse(json)?),
            ValueKind::Annotations => Self::Annotations(List::parse(json)?),
            ValueKind::Any | ValueKind::Document => Self::Any(AnyJson::parse(json)?),
            ValueKind::Deferred => {
                return Err(DocError::invalid(kind, json.to_string(), "deferred values cannot be parsed"));
            }
        };
        Ok(value)
    }

    /// Serialize to JSON
    ///
    /// Fails if the value is an unresolved placeholder.
    pub fn serialize(&self) -> Result<Json, DocError> {
        match self {
            Self::Text(v) => v.serialize(),
            Self::Int(v) => v.serialize(),
            Self::Float(v) => v.serialize(),
            Self::Number(v) => v.serialize(),
            Self::Date(v) => v.serialize(),
            Self::Duration(v) => v.serialize(),
            Self::Uuid(v) => v.serialize(),
            Self::TextList(v) => v.serialize(),
            Self::UuidList(v) => v.serialize(),
            Self::Annotations(v) => v.serialize(),
            Self::Any(v) => v.serialize(),
            Self::Deferred(_) => Err(DocError::Unresolved("deferred uuid".to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Number(v) => write!(f, "{}", v),
            Self::Date(v) => write!(f, "{}", v),
            Self::Duration(v) => write!(f, "{}", v),
            Self::Uuid(v) => write!(f, "{}", v),
            Self::Deferred(v) => write!(f, "{:?}", v),
            other => match other.serialize() {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "{:?}", other),
            },
        }
    }
}

macro_rules! stored {
    ($ty:ty, $variant:ident) => {
        impl Stored for $ty {
            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut Value) -> Option<&mut Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

stored!(Text, Text);
stored!(Int, Int);
stored!(Float, Float);
stored!(Number, Number);
stored!(Date, Date);
stored!(Duration, Duration);
stored!(Uuid, Uuid);
stored!(List<Text>, TextList);
stored!(List<Uuid>, UuidList);
stored!(List<Annotation>, Annotations);
stored!(AnyJson, Any);

impl From<DeferredUuid> for Value {
    fn from(v: DeferredUuid) -> Self {
        Value::Deferred(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Text::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Text::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(Int::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(Float::from(v))
    }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for Value {
    fn from(v: chrono::DateTime<Tz>) -> Self {
        Value::Date(Date::from(v))
    }
}

impl From<chrono::TimeDelta> for Value {
    fn from(v: chrono::TimeDelta) -> Self {
        Value::Duration(Duration::from(v))
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Uuid(Uuid::from(v))
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextList(v.into_iter().map(Text::from).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::TextList(v.into_iter().map(Text::from).collect())
    }
}

impl From<Vec<uuid::Uuid>> for Value {
    fn from(v: Vec<uuid::Uuid>) -> Self {
        Value::UuidList(v.into_iter().map(Uuid::from).collect())
    }
}

impl From<Vec<Annotation>> for Value {
    fn from(v: Vec<Annotation>) -> Self {
        Value::Annotations(v.into_iter().collect())
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::Any(AnyJson::from(v))
    }
}
