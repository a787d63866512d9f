//! Scalar value wrappers: strings, integers, floats, mixed numbers, UUIDs and raw JSON

use std::fmt;

use serde_json::Value as Json;

use crate::error::DocError;
use crate::value::{Typed, ValueKind};

/// A string field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Text(String);

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Typed for Text {
    const KIND: ValueKind = ValueKind::Text;
    const LIST_KIND: Option<ValueKind> = Some(ValueKind::TextList);

    fn parse(json: &Json) -> Result<Self, DocError> {
        json.as_str()
            .map(Self::new)
            .ok_or_else(|| DocError::mismatch(Self::KIND, "string", json))
    }

    fn serialize(&self) -> Result<Json, DocError> {
        Ok(Json::String(self.0.clone()))
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Text {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Text {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for Text {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

/// An integer field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Int(i64);

impl Int {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl Typed for Int {
    const KIND: ValueKind = ValueKind::Int;

    fn parse(json: &Json) -> Result<Self, DocError> {
        match json {
            Json::Number(n) if n.is_u64() && n.as_i64().is_none() => {
                Err(DocError::invalid(Self::KIND, n.to_string(), "out of range"))
            }
            _ => json
                .as_i64()
                .map(Self)
                .ok_or_else(|| DocError::mismatch(Self::KIND, "integer", json)),
        }
    }

    fn serialize(&self) -> Result<Json, DocError> {
        Ok(Json::from(self.0))
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Int {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A floating point field
///
/// Integral JSON input is accepted; the tracker writes `0` for a zero urgency.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Float(f64);

impl Float {
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Typed for Float {
    const KIND: ValueKind = ValueKind::Float;

    fn parse(json: &Json) -> Result<Self, DocError> {
        json.as_f64()
            .map(Self)
            .ok_or_else(|| DocError::mismatch(Self::KIND, "number", json))
    }

    fn serialize(&self) -> Result<Json, DocError> {
        serde_json::Number::from_f64(self.0)
            .map(Json::Number)
            .ok_or_else(|| DocError::invalid(Self::KIND, self.0.to_string(), "not a finite number"))
    }
}

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Float {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// A numeric field that remembers whether it arrived as an integer or a float
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(x) => x,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int(_))
    }
}

impl Typed for Number {
    const KIND: ValueKind = ValueKind::Number;

    fn parse(json: &Json) -> Result<Self, DocError> {
        match json {
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                // An f64 cannot hold every integer above i64::MAX exactly
                None if n.is_u64() => Err(DocError::invalid(Self::KIND, n.to_string(), "out of range")),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| DocError::invalid(Self::KIND, n.to_string(), "out of range")),
            },
            other => Err(DocError::mismatch(Self::KIND, "number", other)),
        }
    }

    fn serialize(&self) -> Result<Json, DocError> {
        match *self {
            Self::Int(i) => Ok(Json::from(i)),
            Self::Float(x) => Float(x).serialize(),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.as_f64() == other.as_f64()
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_f64().partial_cmp(&other.as_f64())
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A UUID field, serialized in the canonical lowercase hyphenated form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uuid(uuid::Uuid);

impl Uuid {
    /// Generate a random (version 4) UUID
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Derive a name-based (version 5) UUID
    pub fn new_v5(namespace: &uuid::Uuid, name: &str) -> Self {
        Self(uuid::Uuid::new_v5(namespace, name.as_bytes()))
    }

    pub fn get(self) -> uuid::Uuid {
        self.0
    }

    /// First hyphen-separated segment, as the tracker displays short UUIDs
    pub fn short(&self) -> String {
        let full = self.0.hyphenated().to_string();
        full.split('-').next().unwrap_or_default().to_string()
    }
}

impl Typed for Uuid {
    const KIND: ValueKind = ValueKind::Uuid;
    const LIST_KIND: Option<ValueKind> = Some(ValueKind::UuidList);

    fn parse(json: &Json) -> Result<Self, DocError> {
        let s = json
            .as_str()
            .ok_or_else(|| DocError::mismatch(Self::KIND, "string", json))?;
        s.parse().map(Self).map_err(|e| DocError::invalid(Self::KIND, s, e))
    }

    fn serialize(&self) -> Result<Json, DocError> {
        Ok(Json::String(self.to_string()))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for Uuid {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(&Json::String(s.to_string()))
    }
}

impl From<uuid::Uuid> for Uuid {
    fn from(value: uuid::Uuid) -> Self {
        Self(value)
    }
}

impl PartialEq<uuid::Uuid> for Uuid {
    fn eq(&self, other: &uuid::Uuid) -> bool {
        self.0 == *other
    }
}

/// Any JSON value, stored verbatim; used for fields the schema doesn't know
#[derive(Debug, Clone, PartialEq)]
pub struct AnyJson(Json);

impl AnyJson {
    pub fn get(&self) -> &Json {
        &self.0
    }

    pub fn into_inner(self) -> Json {
        self.0
    }
}

impl Typed for AnyJson {
    const KIND: ValueKind = ValueKind::Any;

    fn parse(json: &Json) -> Result<Self, DocError> {
        Ok(Self(json.clone()))
    }

    fn serialize(&self) -> Result<Json, DocError> {
        Ok(self.0.clone())
    }
}

impl From<Json> for AnyJson {
    fn from(value: Json) -> Self {
        Self(value)
    }
}
