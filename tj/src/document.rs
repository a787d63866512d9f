//! Typed documents
//!
//! A [`Document`] is an insertion-ordered map from field name to [`Value`],
//! parameterized by a [`Schema`] that declares the kind of every known field.
//! Values are coerced to the declared kind on construction and on every
//! write, so a document never holds a value of the wrong kind.

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value as Json;
use tracing::debug;

use crate::deferred::{DeferredUuid, IdFactory};
use crate::error::DocError;
use crate::value::{Stored, Typed, Value, ValueKind};

/// Custom parser for a field whose JSON form needs more than the kind's default parse
pub type FieldParser = fn(&Json) -> Result<Value, DocError>;

/// One schema entry
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: ValueKind,
    pub parser: Option<FieldParser>,
}

impl Field {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            parser: None,
        }
    }

    pub const fn with_parser(name: &'static str, kind: ValueKind, parser: FieldParser) -> Self {
        Self {
            name,
            kind,
            parser: Some(parser),
        }
    }

    fn parse(&self, json: &Json) -> Result<Value, DocError> {
        match self.parser {
            Some(parser) => parser(json),
            None => Value::parse(self.kind, json),
        }
    }
}

/// Declarative field table for a document type
pub trait Schema: Clone + fmt::Debug + PartialEq + 'static {
    /// Name used in error messages
    const NAME: &'static str;

    /// Known fields, in declaration order
    const FIELDS: &'static [Field];

    /// Fields a complete document must have
    const REQUIRED: &'static [&'static str] = &[];

    /// Kind for fields not in [`Schema::FIELDS`]; `None` rejects unknown fields
    const FALLBACK: Option<ValueKind> = None;

    /// Field that cannot be overwritten once it holds a value
    const IMMUTABLE: Option<&'static str> = None;

    /// Kind of a list of these documents, if one can be stored in another document
    const LIST_KIND: Option<ValueKind> = None;

    /// Find the declaration for a field
    fn lookup(name: &str) -> Option<&'static Field> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
}

/// A schema-checked JSON object
#[derive(Clone)]
pub struct Document<S> {
    entries: Vec<(String, Value)>,
    id_factory: Option<IdFactory>,
    _schema: PhantomData<S>,
}

impl<S: Schema> Default for Document<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Document<S> {
    /// An empty document
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            id_factory: None,
            _schema: PhantomData,
        }
    }

    /// Build from a JSON object, parsing every field through the schema
    pub fn from_json(json: &Json) -> Result<Self, DocError> {
        debug!(schema = S::NAME, "Document::from_json: called");
        let object = json
            .as_object()
            .ok_or_else(|| DocError::mismatch(ValueKind::Document, "object", json))?;
        let mut doc = Self::new();
        for (key, raw) in object {
            let value = Self::field_for(key)?.parse(raw)?;
            doc.put(key.clone(), value);
        }
        Ok(doc)
    }

    /// Parse one JSON object from a string
    pub fn from_json_str(s: &str) -> Result<Self, DocError> {
        let json: Json = serde_json::from_str(s)?;
        Self::from_json(&json)
    }

    /// Build from key/value pairs, coercing each value
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, DocError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut doc = Self::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = doc.coerce(&key, value.into())?;
            doc.put(key, value);
        }
        Ok(doc)
    }

    fn field_for(key: &str) -> Result<Field, DocError> {
        if let Some(field) = S::lookup(key) {
            return Ok(*field);
        }
        match S::FALLBACK {
            Some(kind) => Ok(Field {
                name: S::NAME,
                kind,
                parser: None,
            }),
            None => Err(DocError::UnknownKey {
                schema: S::NAME,
                key: key.to_string(),
            }),
        }
    }

    /// Declared kind of a field, if the schema accepts it
    pub fn kind_of(key: &str) -> Result<ValueKind, DocError> {
        Self::field_for(key).map(|f| f.kind)
    }

    /// True if the field holds a list
    pub fn key_is_list(key: &str) -> bool {
        matches!(
            Self::kind_of(key),
            Ok(ValueKind::TextList | ValueKind::UuidList | ValueKind::Annotations)
        )
    }

    fn coerce(&self, key: &str, value: Value) -> Result<Value, DocError> {
        let field = Self::field_for(key)?;
        let kind = value.kind();
        if kind == field.kind || (kind == ValueKind::Deferred && field.kind == ValueKind::Uuid) {
            return Ok(value);
        }
        debug!(key, from = %kind, to = %field.kind, "Document::coerce: converting value");
        let json = value.serialize()?;
        field.parse(&json)
    }

    /// Store a value that already has the field's declared kind
    pub(crate) fn put(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    fn check_mutable(&self, key: &str) -> Result<(), DocError> {
        if S::IMMUTABLE == Some(key) {
            if let Some(existing) = self.get_opt(key) {
                if !matches!(existing, Value::Deferred(_)) {
                    return Err(DocError::ImmutableField(key.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Store a value, coercing it to the field's declared kind
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), DocError> {
        let key = key.into();
        self.check_mutable(&key)?;
        let value = self.coerce(&key, value.into())?;
        self.put(key, value);
        Ok(())
    }

    /// Store a raw JSON value, parsing it as the field's declared kind
    pub fn set_json(&mut self, key: impl Into<String>, json: &Json) -> Result<(), DocError> {
        let key = key.into();
        self.check_mutable(&key)?;
        let value = Self::field_for(&key)?.parse(json)?;
        self.put(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Value, DocError> {
        self.get_opt(key).ok_or_else(|| DocError::KeyNotFound(key.to_string()))
    }

    pub fn get_opt(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_opt(key).is_some()
    }

    /// Borrow a field as a specific wrapper type
    ///
    /// Fails with `KeyNotFound` if absent and `TypeAssertion` if it holds
    /// another kind.
    pub fn get_typed<T: Stored>(&self, key: &str) -> Result<&T, DocError> {
        let value = self.get(key)?;
        T::from_value(value).ok_or_else(|| assertion_error(key, T::KIND, value))
    }

    /// Like [`Document::get_typed`], but an absent field is `Ok(None)`
    pub fn get_typed_opt<T: Stored>(&self, key: &str) -> Result<Option<&T>, DocError> {
        match self.get_opt(key) {
            None => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| assertion_error(key, T::KIND, value)),
        }
    }

    /// Like [`Document::get_typed`], returning `default` if the field is absent
    pub fn get_typed_or<T: Stored>(&self, key: &str, default: T) -> Result<T, DocError> {
        Ok(self.get_typed_opt::<T>(key)?.cloned().unwrap_or(default))
    }

    pub fn get_typed_mut<T: Stored>(&mut self, key: &str) -> Result<&mut T, DocError> {
        let value = self
            .entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| DocError::KeyNotFound(key.to_string()))?;
        let found = value.kind();
        T::from_value_mut(value).ok_or_else(|| {
            if found == ValueKind::Deferred {
                DocError::Unresolved(key.to_string())
            } else {
                DocError::TypeAssertion {
                    key: key.to_string(),
                    expected: T::KIND,
                    found,
                }
            }
        })
    }

    /// Remove a field, ignoring absence
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Remove a field that must be present
    pub fn delete(&mut self, key: &str) -> Result<Value, DocError> {
        self.remove(key).ok_or_else(|| DocError::KeyNotFound(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Required fields this document lacks
    pub fn missing_required_keys(&self) -> Vec<&'static str> {
        S::REQUIRED.iter().copied().filter(|k| !self.contains(k)).collect()
    }

    pub fn has_required_keys(&self) -> bool {
        self.missing_required_keys().is_empty()
    }

    /// Generate the immutable field lazily with `factory` whenever it is absent
    pub fn with_generated_id(mut self, factory: IdFactory) -> Self {
        self.id_factory = Some(factory);
        self.install_placeholder();
        self
    }

    /// Put a fresh placeholder in the immutable field if generation is enabled and the field is empty
    pub(crate) fn install_placeholder(&mut self) {
        if let (Some(key), Some(factory)) = (S::IMMUTABLE, self.id_factory) {
            if !self.contains(key) {
                debug!(schema = S::NAME, key, "Document::install_placeholder: deferring id generation");
                self.put(key.to_string(), Value::Deferred(DeferredUuid::new(factory)));
            }
        }
    }

    /// Resolve deferred values; returns true when none remain
    pub fn resolve(&mut self) -> bool {
        let mut all_resolved = true;
        for (key, value) in self.entries.iter_mut() {
            let resolved = match value {
                Value::Deferred(deferred) => deferred.resolve(),
                _ => continue,
            };
            match resolved {
                Some(uuid) => {
                    debug!(key = %key, %uuid, "Document::resolve: generated id");
                    *value = Value::Uuid(uuid);
                }
                None => all_resolved = false,
            }
        }
        all_resolved
    }

    /// Serialize to a JSON object in field insertion order
    pub fn to_json(&self) -> Result<Json, DocError> {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.entries {
            let json = value.serialize().map_err(|e| match e {
                DocError::Unresolved(_) => DocError::Unresolved(key.clone()),
                other => other,
            })?;
            map.insert(key.clone(), json);
        }
        Ok(Json::Object(map))
    }

    /// Resolve deferred values and serialize to a single line of JSON
    pub fn to_json_string(&mut self) -> Result<String, DocError> {
        self.resolve();
        Ok(serde_json::to_string(&self.to_json()?)?)
    }
}

fn assertion_error(key: &str, expected: ValueKind, found: &Value) -> DocError {
    if matches!(found, Value::Deferred(_)) {
        return DocError::Unresolved(key.to_string());
    }
    DocError::TypeAssertion {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

impl<S: Schema> Typed for Document<S> {
    const KIND: ValueKind = ValueKind::Document;
    const LIST_KIND: Option<ValueKind> = S::LIST_KIND;

    fn parse(json: &Json) -> Result<Self, DocError> {
        Self::from_json(json)
    }

    fn serialize(&self) -> Result<Json, DocError> {
        self.to_json()
    }
}

impl<S: Schema> fmt::Debug for Document<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", S::NAME)?;
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

impl<S: Schema> PartialEq for Document<S> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<S: Schema> serde::Serialize for Document<S> {
    fn serialize<Ser: serde::Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let json = self.to_json().map_err(serde::ser::Error::custom)?;
        serde::Serialize::serialize(&json, serializer)
    }
}

impl<'de, S: Schema> serde::Deserialize<'de> for Document<S> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = <Json as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}
