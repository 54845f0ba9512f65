//! Declarative form schemas

use super::state::FieldValue;
use super::validators::{EnumChoice, FieldValidator, FormValidator};
use crate::core::naming::NamingConvention;
use crate::core::registry::{DbEnum, EnumDescriptor};
use std::fmt;
use std::sync::Arc;

/// Kind of input a field takes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Number,
    Checkbox,
    /// One variant of a database enum
    Choice(&'static EnumDescriptor),
    /// Ordered list of text entries
    TextList,
}

/// One field of a form
#[derive(Clone)]
pub struct FieldDefinition {
    name: String,
    label_key: String,
    kind: FieldKind,
    initial: FieldValue,
    validators: Vec<Arc<dyn FieldValidator>>,
}

impl FieldDefinition {
    /// Field with a kind and an empty initial value
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let label_key = format!("field.{}", NamingConvention::SnakeCase.apply(&name));
        Self {
            name,
            label_key,
            kind,
            initial: FieldValue::Empty,
            validators: Vec::new(),
        }
    }

    /// Single line text field
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Numeric field
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// Checkbox
    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Checkbox).initial(false)
    }

    /// List of text entries
    pub fn text_list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::TextList).initial(Vec::<String>::new())
    }

    /// Choice among the variants of `E`; input outside the enum is rejected
    pub fn choice<E: DbEnum>(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Choice(E::DESCRIPTOR)).validator(EnumChoice(E::DESCRIPTOR))
    }

    #[must_use]
    pub fn label(mut self, key: impl Into<String>) -> Self {
        self.label_key = key.into();
        self
    }

    #[must_use]
    pub fn initial(mut self, value: impl Into<FieldValue>) -> Self {
        self.initial = value.into();
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl FieldValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Translation key of the label
    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    /// Kind of value the field holds
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Value the field starts with and resets to
    pub fn initial_value(&self) -> &FieldValue {
        &self.initial
    }

    /// Run every field validator, concatenating their errors
    pub fn validate(&self, value: &FieldValue) -> Vec<super::ValidationError> {
        self.validators
            .iter()
            .flat_map(|validator| validator.validate(value))
            .collect()
    }

    /// Variants offered by a choice field, as `(db value, translation key)`
    pub fn options(&self) -> Vec<(String, String)> {
        match self.kind {
            FieldKind::Choice(descriptor) => descriptor
                .variants
                .iter()
                .map(|variant| {
                    (
                        descriptor.convention.apply(variant),
                        format!(
                            "{}.{}",
                            descriptor.name,
                            NamingConvention::SnakeCase.apply(variant)
                        ),
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("validators", &self.validators)
            .finish()
    }
}

/// Fields plus form-level validators
#[derive(Clone, Default)]
pub struct FormSchema {
    name: String,
    fields: Vec<FieldDefinition>,
    validators: Vec<Arc<dyn FormValidator>>,
}

impl FormSchema {
    /// Empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl FormValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Field by name
    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn form_validators(&self) -> &[Arc<dyn FormValidator>] {
        &self.validators
    }
}

impl fmt::Debug for FormSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("form_validators", &self.validators.len())
            .finish()
    }
}
