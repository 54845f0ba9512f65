//! Field values and per-control state

use super::validators::ValidationError;
use crate::core::registry::DbEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value held by a form control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// True for `Empty`, blank text and lists without a non-blank entry
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Bool(_) | FieldValue::Number(_) => false,
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    /// Text content: the text itself, or every list entry
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            FieldValue::Text(text) => std::slice::from_ref(text),
            FieldValue::List(items) => items,
            _ => &[],
        };
        items.iter().map(String::as_str)
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric content; text is parsed after trimming
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Checkbox value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Empty, Into::into)
    }
}

/// Field name → value, as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl FormValues {
    /// No values
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Value by field name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Trimmed text, `None` when missing or blank
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    /// Trimmed non-blank entries of a list field
    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|value| {
                value
                    .texts()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Field as a number
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }

    /// Checkbox state; missing is `false`
    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(FieldValue::as_bool).unwrap_or(false)
    }

    /// Enum variant parsed leniently from a text field
    pub fn enum_value<E: DbEnum>(&self, name: &str) -> Option<E> {
        self.text(name).and_then(|text| E::parse(&text))
    }

    /// Values by field name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

/// Where a control is in its edit/validate cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldStatus {
    /// Untouched since the last load or reset
    Pristine,
    /// Changed by the user, not yet validated
    Edited,
    Valid,
    Invalid,
}

/// State of one control
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub value: FieldValue,
    pub initial: FieldValue,
    /// Bumped on every programmatic replacement of the value
    pub revision: u64,
    pub status: FieldStatus,
    pub errors: Vec<ValidationError>,
}

impl ControlState {
    pub(crate) fn new(initial: FieldValue) -> Self {
        Self {
            value: initial.clone(),
            initial,
            revision: 0,
            status: FieldStatus::Pristine,
            errors: Vec::new(),
        }
    }

    /// Whether the value differs from the initial one
    pub fn is_modified(&self) -> bool {
        self.value != self.initial
    }

    pub(crate) fn edit(&mut self, value: FieldValue) {
        self.value = value;
        self.status = FieldStatus::Edited;
        self.errors.clear();
    }

    pub(crate) fn replace(&mut self, value: FieldValue) {
        self.value = value.clone();
        self.initial = value;
        self.revision += 1;
        self.status = FieldStatus::Pristine;
        self.errors.clear();
    }

    pub(crate) fn set_errors(&mut self, errors: Vec<ValidationError>) {
        self.status = if errors.is_empty() {
            FieldStatus::Valid
        } else {
            FieldStatus::Invalid
        };
        self.errors = errors;
    }

    pub(crate) fn add_error(&mut self, error: ValidationError) {
        self.status = FieldStatus::Invalid;
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json() {
        let values: FormValues = serde_json::from_str(
            r#"{"titles": ["A", "B"], "volumes": 12, "owned": true, "note": null, "url": "x"}"#,
        )
        .unwrap();
        assert_eq!(values.list("titles"), vec!["A", "B"]);
        assert_eq!(values.number("volumes"), Some(12.0));
        assert!(values.bool("owned"));
        assert_eq!(values.get("note"), Some(&FieldValue::Empty));
        assert_eq!(values.text("url").as_deref(), Some("x"));
    }

    #[test]
    fn test_list_helpers_skip_blank_entries() {
        let values = FormValues::new().with(
            "titles",
            vec![" One ".to_string(), "".to_string(), "Two".to_string()],
        );
        assert_eq!(values.list("titles"), vec!["One", "Two"]);
        assert_eq!(values.text("missing"), None);
    }

    #[test]
    fn test_control_transitions() {
        let mut control = ControlState::new(FieldValue::Empty);
        assert_eq!(control.status, FieldStatus::Pristine);

        control.edit("x".into());
        assert_eq!(control.status, FieldStatus::Edited);
        assert!(control.is_modified());

        control.set_errors(Vec::new());
        assert_eq!(control.status, FieldStatus::Valid);

        control.edit("y".into());
        assert_eq!(control.status, FieldStatus::Edited);

        control.replace("z".into());
        assert_eq!(control.revision, 1);
        assert_eq!(control.status, FieldStatus::Pristine);
        assert!(!control.is_modified());
    }
}
