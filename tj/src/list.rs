//! Homogeneous typed lists

use std::ops::Deref;

use serde_json::Value as Json;

use crate::error::DocError;
use crate::value::{Typed, ValueKind};

/// An ordered list whose elements all share one wrapper type
///
/// Every element added goes through the element type's coercion. Reads go
/// through `Deref<Target = [T]>`.
#[derive(Debug, Clone, PartialEq)]
pub struct List<T> {
    items: Vec<T>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Typed> List<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one element
    pub fn push(&mut self, item: impl Into<T>) {
        self.items.push(item.into());
    }

    /// Append a raw JSON element, coercing it to the element type
    pub fn push_json(&mut self, json: &Json) -> Result<(), DocError> {
        self.items.push(T::parse(json)?);
        Ok(())
    }

    /// Append every element of an iterator
    pub fn extend<I>(&mut self, items: I)
    where
        I: IntoIterator,
        I::Item: Into<T>,
    {
        self.items.extend(items.into_iter().map(Into::into));
    }

    /// Replace the element at `index`
    pub fn set(&mut self, index: usize, item: impl Into<T>) -> Result<(), DocError> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or_else(|| DocError::ContractViolation(format!("index {} out of range for list of {}", index, len)))?;
        *slot = item.into();
        Ok(())
    }

    /// Remove the first element equal to `item`
    pub fn remove(&mut self, item: impl Into<T>) -> Result<T, DocError> {
        let item = item.into();
        match self.items.iter().position(|existing| *existing == item) {
            Some(pos) => Ok(self.items.remove(pos)),
            None => Err(DocError::ValueNotFound(describe(&item))),
        }
    }

    /// Remove the first element equal to the coerced JSON value
    pub fn remove_json(&mut self, json: &Json) -> Result<T, DocError> {
        let item = T::parse(json)?;
        self.remove(item)
    }

    /// Element equality membership test
    pub fn contains_item(&self, item: impl Into<T>) -> bool {
        let item = item.into();
        self.items.contains(&item)
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

fn describe<T: Typed>(item: &T) -> String {
    match item.serialize() {
        Ok(json) => json.to_string(),
        Err(_) => format!("{:?}", item),
    }
}

impl<T: Typed> Typed for List<T> {
    const KIND: ValueKind = match T::LIST_KIND {
        Some(kind) => kind,
        None => ValueKind::Any,
    };

    fn parse(json: &Json) -> Result<Self, DocError> {
        match json {
            Json::Array(values) => values.iter().map(T::parse).collect(),
            other => Err(DocError::mismatch(Self::KIND, "array", other)),
        }
    }

    fn serialize(&self) -> Result<Json, DocError> {
        self.items
            .iter()
            .map(Typed::serialize)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array)
    }
}

impl<T> Deref for List<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for List<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> From<Vec<T>> for List<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{Text, Uuid};
    use serde_json::json;

    #[test]
    fn test_parse_coerces_every_element() {
        let list = List::<Uuid>::parse(&json!(["6ba7b810-9dad-11d1-80b4-00c04fd430c8"])).unwrap();
        assert_eq!(list.len(), 1);

        let err = List::<Uuid>::parse(&json!(["not-a-uuid"])).unwrap_err();
        assert!(matches!(err, DocError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = List::<Text>::parse(&json!("inbox")).unwrap_err();
        assert!(matches!(err, DocError::TypeMismatch { .. }));
    }

    #[test]
    fn test_kind_follows_element() {
        assert_eq!(List::<Text>::KIND, ValueKind::TextList);
        assert_eq!(List::<Uuid>::KIND, ValueKind::UuidList);
    }

    #[test]
    fn test_push_extend_remove() {
        let mut list = List::<Text>::new();
        list.push("a");
        list.extend(["b", "c"]);
        assert_eq!(list.len(), 3);

        let removed = list.remove("b").unwrap();
        assert_eq!(removed, "b");
        assert_eq!(list.serialize().unwrap(), json!(["a", "c"]));
    }

    #[test]
    fn test_remove_missing_is_value_not_found() {
        let mut list = List::<Text>::new();
        list.push("a");
        assert!(matches!(list.remove("z"), Err(DocError::ValueNotFound(_))));
    }

    #[test]
    fn test_json_coercion_paths() {
        let mut list = List::<Text>::new();
        list.push_json(&json!("x")).unwrap();
        assert!(list.push_json(&json!(1)).is_err());
        list.remove_json(&json!("x")).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_set_out_of_range() {
        let mut list = List::<Text>::new();
        assert!(list.set(0, "a").is_err());
        list.push("a");
        list.set(0, "b").unwrap();
        assert!(list.contains_item("b"));
    }
}
