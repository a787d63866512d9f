//! Document error types

use thiserror::Error;

use crate::value::ValueKind;

/// Errors raised while parsing, reading or mutating typed documents
#[derive(Debug, Error)]
pub enum DocError {
    #[error("Expected JSON {expected} for {kind} value, found {found}")]
    TypeMismatch {
        kind: ValueKind,
        expected: &'static str,
        found: String,
    },

    #[error("Cannot interpret {value:?} as {kind}: {reason}")]
    InvalidValue {
        kind: ValueKind,
        value: String,
        reason: String,
    },

    #[error("Field {key:?} holds a {found} value, not {expected}")]
    TypeAssertion {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("No field {0:?}")]
    KeyNotFound(String),

    #[error("Field {key:?} is not known to {schema}")]
    UnknownKey { schema: &'static str, key: String },

    #[error("Field {0:?} is immutable once set")]
    ImmutableField(String),

    #[error("Task has no tag {0:?}")]
    NoSuchTag(String),

    #[error("No task matching {0}")]
    NoSuchTask(String),

    #[error("Value {0} not in list")]
    ValueNotFound(String),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Field {0:?} has not been resolved yet")]
    Unresolved(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocError {
    /// Build a type mismatch error from the offending JSON value
    pub(crate) fn mismatch(kind: ValueKind, expected: &'static str, found: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            kind,
            expected,
            found: json_shape(found).to_string(),
        }
    }

    /// Build an invalid value error
    pub(crate) fn invalid(kind: ValueKind, value: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            kind,
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is a missing key
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, DocError::KeyNotFound(_))
    }
}

/// Describe the runtime shape of a JSON value
pub(crate) fn json_shape(value: &serde_json::Value) -> &'static str {
    use serde_json::Value as Json;
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "integer",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
