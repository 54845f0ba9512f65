//! Headless form engine
//!
//! A [`FormSchema`] declares fields and validators; a [`Form`] holds the
//! live state of every control and gates submission:
//!
//! 1. every field validator runs, each control becomes `Valid` or `Invalid`;
//! 2. only when all fields are valid, the form validators run (they may hit
//!    the database) and can attach further errors;
//! 3. [`Form::submit`] hands out the values only when both levels are clean.
//!
//! ```
//! use media_catalog::form::{FieldDefinition, Form, FormSchema, FormValues, MaxLength, Required};
//!
//! # tokio_test_block_on(async {
//! let schema = FormSchema::new("note")
//!     .field(FieldDefinition::text("title").validator(Required).validator(MaxLength(20)));
//! let mut form = Form::new(schema.into());
//! form.set_value("title", "Dungeon notes").unwrap();
//!
//! let values: FormValues = form.submit().await.unwrap();
//! assert_eq!(values.text("title").as_deref(), Some("Dungeon notes"));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod schema;
pub mod state;
pub mod validators;

pub use schema::{FieldDefinition, FieldKind, FormSchema};
pub use state::{ControlState, FieldStatus, FieldValue, FormValues};
pub use validators::{
    normalize_title, EnumChoice, FieldError, FieldValidator, FormValidator, MaxLength, MinEntries,
    NumericRange, OneOf, Required, UniqueEntries, Url, ValidationError,
};

use crate::core::error::DatabaseError;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Validation errors that blocked a submit
#[derive(Debug, Clone, PartialEq, Error)]
#[error("form rejected with {} error(s)", errors.len())]
pub struct FormRejected {
    pub errors: Vec<FieldError>,
}

impl FormRejected {
    /// Errors attached to `field`
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors
            .iter()
            .filter(move |e| e.field.as_deref() == Some(field))
            .map(|e| &e.error)
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error(transparent)]
    Rejected(#[from] FormRejected),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Live state of a form built from a schema
#[derive(Debug, Clone)]
pub struct Form {
    schema: Arc<FormSchema>,
    controls: BTreeMap<String, ControlState>,
    form_errors: Vec<ValidationError>,
}

impl Form {
    /// A pristine form over `schema`
    pub fn new(schema: Arc<FormSchema>) -> Self {
        let controls = schema
            .fields()
            .iter()
            .map(|field| {
                (
                    field.name().to_string(),
                    ControlState::new(field.initial_value().clone()),
                )
            })
            .collect();
        Self {
            schema,
            controls,
            form_errors: Vec::new(),
        }
    }

    /// The schema the form was built from
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// State of one control
    pub fn control(&self, name: &str) -> Option<&ControlState> {
        self.controls.get(name)
    }

    fn control_mut(&mut self, name: &str) -> Result<&mut ControlState, FormError> {
        self.controls
            .get_mut(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    /// User edit: the control goes back to `Edited`
    pub fn set_value(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), FormError> {
        self.control_mut(name)?.edit(value.into());
        self.form_errors.clear();
        Ok(())
    }

    /// Replace values programmatically, e.g. when opening an existing record
    ///
    /// Loaded values become the new initial values; fields absent from
    /// `values` keep their current value. Every touched control gets a new
    /// revision.
    pub fn load(&mut self, values: &FormValues) -> Result<(), FormError> {
        for (name, value) in values.iter() {
            self.control_mut(name)?.replace(value.clone());
        }
        self.form_errors.clear();
        Ok(())
    }

    /// Restore the schema's initial values
    pub fn reset(&mut self) {
        for field in self.schema.fields() {
            if let Some(control) = self.controls.get_mut(field.name()) {
                control.replace(field.initial_value().clone());
            }
        }
        self.form_errors.clear();
    }

    /// Run the field validators only; true when every field is valid
    pub fn validate_fields(&mut self) -> bool {
        let mut all_valid = true;
        for field in self.schema.fields() {
            if let Some(control) = self.controls.get_mut(field.name()) {
                let errors = field.validate(&control.value);
                all_valid &= errors.is_empty();
                control.set_errors(errors);
            }
        }
        all_valid
    }

    /// Run field validators, then form validators if the fields pass
    ///
    /// Returns true when no error was found at either level. Database
    /// failures inside a form validator are returned as `Err`.
    pub async fn validate(&mut self) -> crate::core::error::Result<bool> {
        self.form_errors.clear();
        if !self.validate_fields() {
            return Ok(false);
        }

        let values = self.values();
        let schema = Arc::clone(&self.schema);
        let mut clean = true;
        for validator in schema.form_validators() {
            for found in validator.validate(&values).await? {
                clean = false;
                match found.field.as_deref().and_then(|f| self.controls.get_mut(f)) {
                    Some(control) => control.add_error(found.error),
                    None => self.form_errors.push(found.error),
                }
            }
        }
        Ok(clean)
    }

    /// Validate and hand out the values, or every error found
    pub async fn submit(&mut self) -> Result<FormValues, FormError> {
        if self.validate().await? {
            Ok(self.values())
        } else {
            Err(FormRejected {
                errors: self.errors(),
            }
            .into())
        }
    }

    /// Current values of every control
    pub fn values(&self) -> FormValues {
        let mut values = FormValues::new();
        for (name, control) in &self.controls {
            values.insert(name.clone(), control.value.clone());
        }
        values
    }

    /// Every error currently attached, field-scoped first in schema order
    pub fn errors(&self) -> Vec<FieldError> {
        let mut errors: Vec<FieldError> = self
            .schema
            .fields()
            .iter()
            .filter_map(|field| self.controls.get(field.name()).map(|c| (field.name(), c)))
            .flat_map(|(name, control)| {
                control
                    .errors
                    .iter()
                    .map(move |error| FieldError::field(name, error.clone()))
            })
            .collect();
        errors.extend(self.form_errors.iter().cloned().map(FieldError::form));
        errors
    }

    /// Errors not tied to a field
    pub fn form_errors(&self) -> &[ValidationError] {
        &self.form_errors
    }

    /// True when something differs from the initial values
    pub fn is_modified(&self) -> bool {
        self.controls.values().any(ControlState::is_modified)
    }

    /// Save is allowed once every control validated clean and no form error is pending
    pub fn can_save(&self) -> bool {
        self.form_errors.is_empty()
            && self
                .controls
                .values()
                .all(|control| control.status == FieldStatus::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct RejectTitle(&'static str);

    #[async_trait]
    impl FormValidator for RejectTitle {
        async fn validate(
            &self,
            values: &FormValues,
        ) -> crate::core::error::Result<Vec<FieldError>> {
            Ok(values
                .list("titles")
                .into_iter()
                .filter(|t| normalize_title(t) == normalize_title(self.0))
                .map(|t| FieldError::field("titles", ValidationError::AlreadyExists { value: t }))
                .collect())
        }
    }

    fn schema() -> Arc<FormSchema> {
        Arc::new(
            FormSchema::new("titles")
                .field(
                    FieldDefinition::text_list("titles")
                        .validator(MinEntries(1))
                        .validator(UniqueEntries),
                )
                .field(FieldDefinition::text("sourceUrl").validator(Url))
                .validator(RejectTitle("Taken")),
        )
    }

    fn titles(items: &[&str]) -> FieldValue {
        FieldValue::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_duplicate_titles_block_submit() {
        let mut form = Form::new(schema());
        form.set_value("titles", titles(&["Tower", "tower "])).unwrap();

        let err = form.submit().await.unwrap_err();
        let FormError::Rejected(rejected) = err else {
            panic!("expected rejection, got {err:?}");
        };
        assert_eq!(
            rejected.for_field("titles").collect::<Vec<_>>(),
            vec![&ValidationError::DuplicateEntry {
                value: "tower".into()
            }]
        );
        assert_eq!(form.control("titles").unwrap().status, FieldStatus::Invalid);
        assert!(!form.can_save());
    }

    #[tokio::test]
    async fn test_form_validators_wait_for_fields() {
        let mut form = Form::new(schema());
        form.set_value("titles", titles(&["Taken", "Taken"])).unwrap();
        form.submit().await.unwrap_err();
        // the duplicate is reported, the existing-title check has not run
        let errors = form.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].error, ValidationError::DuplicateEntry { .. }));

        form.set_value("titles", titles(&["Taken"])).unwrap();
        let err = form.submit().await.unwrap_err();
        assert!(matches!(err, FormError::Rejected(_)));
        assert!(matches!(
            form.errors()[0].error,
            ValidationError::AlreadyExists { .. }
        ));
    }

    #[tokio::test]
    async fn test_errors_from_several_fields_are_collected() {
        let mut form = Form::new(schema());
        form.set_value("sourceUrl", "nope").unwrap();

        let Err(FormError::Rejected(rejected)) = form.submit().await else {
            panic!("expected rejection");
        };
        assert_eq!(rejected.errors.len(), 2);
        assert_eq!(rejected.errors[0].field.as_deref(), Some("titles"));
        assert_eq!(rejected.errors[1].field.as_deref(), Some("sourceUrl"));
    }

    #[tokio::test]
    async fn test_submit_and_can_save() {
        let mut form = Form::new(schema());
        assert!(!form.can_save());
        form.set_value("titles", titles(&["Fresh"])).unwrap();
        form.set_value("sourceUrl", "https://example.org/fresh").unwrap();

        let values = form.submit().await.unwrap();
        assert_eq!(values.list("titles"), vec!["Fresh"]);
        assert!(form.can_save());

        form.set_value("sourceUrl", "").unwrap();
        assert_eq!(form.control("sourceUrl").unwrap().status, FieldStatus::Edited);
        assert!(!form.can_save());
    }

    #[test]
    fn test_load_and_reset_bump_revision() {
        let mut form = Form::new(schema());
        form.load(&FormValues::new().with("sourceUrl", "https://example.org"))
            .unwrap();
        let control = form.control("sourceUrl").unwrap();
        assert_eq!(control.revision, 1);
        assert_eq!(control.status, FieldStatus::Pristine);
        assert!(!form.is_modified());

        form.set_value("sourceUrl", "https://example.org/other").unwrap();
        assert!(form.is_modified());

        form.reset();
        let control = form.control("sourceUrl").unwrap();
        assert_eq!(control.revision, 2);
        assert_eq!(control.value, FieldValue::Empty);
    }

    #[test]
    fn test_unknown_field() {
        let mut form = Form::new(schema());
        assert!(matches!(
            form.set_value("nope", "x"),
            Err(FormError::UnknownField(name)) if name == "nope"
        ));
    }
}
