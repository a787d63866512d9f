//! Task annotations

use crate::date::Date;
use crate::document::{Document, Field, Schema};
use crate::scalar::Text;
use crate::value::{Value, ValueKind};

/// Field table for annotations
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSchema;

impl Schema for AnnotationSchema {
    const NAME: &'static str = "Annotation";
    const FIELDS: &'static [Field] = &[
        Field::new("description", ValueKind::Text),
        Field::new("entry", ValueKind::Date),
    ];
    const REQUIRED: &'static [&'static str] = &["description"];
    const LIST_KIND: Option<ValueKind> = Some(ValueKind::Annotations);
}

/// A note attached to a task
pub type Annotation = Document<AnnotationSchema>;

impl Document<AnnotationSchema> {
    /// An annotation with no entry time; the tracker stamps it on import
    pub fn with_description(description: impl Into<String>) -> Self {
        let mut annotation = Self::new();
        annotation.put("description".to_string(), Value::Text(Text::new(description)));
        annotation
    }

    /// An annotation entered at `when`
    pub fn at(description: impl Into<String>, when: impl Into<Date>) -> Self {
        let mut annotation = Self::with_description(description);
        annotation.put("entry".to_string(), Value::Date(when.into()));
        annotation
    }

    pub fn description(&self) -> Option<&str> {
        self.get_typed_opt::<Text>("description").ok().flatten().map(Text::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocError;
    use serde_json::json;

    #[test]
    fn test_with_description() {
        let a = Annotation::with_description("called back");
        assert_eq!(a.description(), Some("called back"));
        assert!(a.has_required_keys());
        assert!(!a.contains("entry"));
    }

    #[test]
    fn test_at_serializes_entry() {
        let when = Date::parse_str("2024-05-01T09:00:00Z").unwrap();
        let a = Annotation::at("left voicemail", when);
        assert_eq!(
            a.to_json().unwrap(),
            json!({"description": "left voicemail", "entry": "2024-05-01T09:00:00Z"})
        );
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = Annotation::from_json(&json!({"description": "x", "mood": "happy"})).unwrap_err();
        assert!(matches!(err, DocError::UnknownKey { .. }));
    }

    #[test]
    fn test_missing_description_is_incomplete() {
        let a = Annotation::from_json(&json!({"entry": "2024-05-01T09:00:00Z"})).unwrap();
        assert_eq!(a.missing_required_keys(), vec!["description"]);
    }
}
