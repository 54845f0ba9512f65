//! Field and form validators
//!
//! Field validators see one value and may report several errors at once.
//! Form validators see every value, may query the database, and only run once
//! all field validators pass.

use super::state::{FieldValue, FormValues};
use crate::core::error::Result;
use crate::core::registry::EnumDescriptor;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

/// A non-fatal validation failure
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationError {
    #[error("value is required")]
    Required,

    #[error("value is longer than {max} characters")]
    TooLong { max: usize, actual: usize },

    #[error("value must be between {min} and {max}")]
    OutOfRange { min: f64, max: f64, actual: f64 },

    #[error("value is not a number")]
    NotANumber,

    #[error("'{value}' is not a valid http(s) URL")]
    InvalidUrl { value: String },

    #[error("'{value}' is not one of the allowed choices")]
    InvalidChoice { value: String },

    #[error("'{value}' appears more than once")]
    DuplicateEntry { value: String },

    #[error("at least {min} entries are required")]
    TooFewEntries { min: usize, actual: usize },

    #[error("'{value}' already exists")]
    AlreadyExists { value: String },
}

impl ValidationError {
    /// Key of the message in the translation table
    pub fn translation_key(&self) -> &'static str {
        match self {
            ValidationError::Required => "validation.required",
            ValidationError::TooLong { .. } => "validation.too_long",
            ValidationError::OutOfRange { .. } => "validation.out_of_range",
            ValidationError::NotANumber => "validation.not_a_number",
            ValidationError::InvalidUrl { .. } => "validation.invalid_url",
            ValidationError::InvalidChoice { .. } => "validation.invalid_choice",
            ValidationError::DuplicateEntry { .. } => "validation.duplicate_entry",
            ValidationError::TooFewEntries { .. } => "validation.too_few_entries",
            ValidationError::AlreadyExists { .. } => "validation.already_exists",
        }
    }

    /// Named arguments substituted into the translated message
    pub fn arguments(&self) -> Vec<(&'static str, String)> {
        match self {
            ValidationError::Required | ValidationError::NotANumber => Vec::new(),
            ValidationError::TooLong { max, actual } => {
                vec![("max", max.to_string()), ("actual", actual.to_string())]
            }
            ValidationError::OutOfRange { min, max, actual } => vec![
                ("min", min.to_string()),
                ("max", max.to_string()),
                ("actual", actual.to_string()),
            ],
            ValidationError::TooFewEntries { min, actual } => {
                vec![("min", min.to_string()), ("actual", actual.to_string())]
            }
            ValidationError::InvalidUrl { value }
            | ValidationError::InvalidChoice { value }
            | ValidationError::DuplicateEntry { value }
            | ValidationError::AlreadyExists { value } => vec![("value", value.clone())],
        }
    }
}

/// An error attached to a field, or to the whole form when `field` is `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub error: ValidationError,
}

impl FieldError {
    /// Error on field `name`
    pub fn field(name: impl Into<String>, error: ValidationError) -> Self {
        Self {
            field: Some(name.into()),
            error,
        }
    }

    /// Error on the form as a whole
    pub fn form(error: ValidationError) -> Self {
        Self { field: None, error }
    }
}

/// Checks a single field value
pub trait FieldValidator: Send + Sync + std::fmt::Debug {
    /// Every problem with `value`; empty when valid
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError>;
}

/// Checks the form as a whole
#[async_trait]
pub trait FormValidator: Send + Sync {
    /// Field-scoped or form-scoped problems; `Err` only for infrastructure failures
    async fn validate(&self, values: &FormValues) -> Result<Vec<FieldError>>;
}

/// Value must be present (non-blank text, non-empty list)
#[derive(Debug, Clone, Copy)]
pub struct Required;

impl FieldValidator for Required {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        if value.is_empty() {
            vec![ValidationError::Required]
        } else {
            Vec::new()
        }
    }
}

/// Text, or every list entry, is at most `max` characters
#[derive(Debug, Clone, Copy)]
pub struct MaxLength(pub usize);

impl FieldValidator for MaxLength {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        value
            .texts()
            .filter_map(|text| {
                let actual = text.chars().count();
                (actual > self.0).then_some(ValidationError::TooLong {
                    max: self.0,
                    actual,
                })
            })
            .collect()
    }
}

/// Number within an inclusive range; text must parse as a number
#[derive(Debug, Clone, Copy)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl FieldValidator for NumericRange {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        if value.is_empty() {
            return Vec::new();
        }
        match value.as_number() {
            Some(actual) if !actual.is_finite() => vec![ValidationError::NotANumber],
            Some(actual) if actual < self.min || actual > self.max => {
                vec![ValidationError::OutOfRange {
                    min: self.min,
                    max: self.max,
                    actual,
                }]
            }
            Some(_) => Vec::new(),
            None => vec![ValidationError::NotANumber],
        }
    }
}

/// Absolute http or https URL; empty values pass
#[derive(Debug, Clone, Copy)]
pub struct Url;

impl FieldValidator for Url {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        value
            .texts()
            .filter(|text| !text.trim().is_empty())
            .filter(|text| {
                !matches!(
                    reqwest::Url::parse(text.trim()),
                    Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host()
                )
            })
            .map(|text| ValidationError::InvalidUrl {
                value: text.to_string(),
            })
            .collect()
    }
}

/// Value must be one of the given options; empty values pass
#[derive(Debug, Clone)]
pub struct OneOf(pub Vec<String>);

impl FieldValidator for OneOf {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        value
            .texts()
            .filter(|text| !text.is_empty() && !self.0.iter().any(|o| o == text))
            .map(|text| ValidationError::InvalidChoice {
                value: text.to_string(),
            })
            .collect()
    }
}

/// Value must name a variant of a database enum, in any spelling
#[derive(Debug, Clone, Copy)]
pub struct EnumChoice(pub &'static EnumDescriptor);

impl FieldValidator for EnumChoice {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        value
            .texts()
            .filter(|text| !text.trim().is_empty() && self.0.parse_lenient(text).is_none())
            .map(|text| ValidationError::InvalidChoice {
                value: text.to_string(),
            })
            .collect()
    }
}

/// No two list entries may be equal after trimming, ignoring case
///
/// Each duplicated entry is reported once.
#[derive(Debug, Clone, Copy)]
pub struct UniqueEntries;

impl FieldValidator for UniqueEntries {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        let mut errors = Vec::new();

        for entry in value.texts() {
            let key = normalize_title(entry);
            if key.is_empty() {
                continue;
            }
            if !seen.insert(key.clone()) && reported.insert(key) {
                errors.push(ValidationError::DuplicateEntry {
                    value: entry.trim().to_string(),
                });
            }
        }
        errors
    }
}

/// List must hold at least `min` non-blank entries
#[derive(Debug, Clone, Copy)]
pub struct MinEntries(pub usize);

impl FieldValidator for MinEntries {
    fn validate(&self, value: &FieldValue) -> Vec<ValidationError> {
        let actual = value.texts().filter(|t| !t.trim().is_empty()).count();
        if actual < self.0 {
            vec![ValidationError::TooFewEntries {
                min: self.0,
                actual,
            }]
        } else {
            Vec::new()
        }
    }
}

/// Comparison form of a title: trimmed, inner whitespace collapsed, lower case
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
