//! Translated labels and messages
//!
//! Keys are flat strings (`reading_status.on_hold`, `validation.too_long`);
//! values may hold `{name}` placeholders. A missing key translates to itself.

use crate::core::error::Result;
use crate::core::registry::DbEnum;
use crate::form::ValidationError;
use std::collections::HashMap;
use std::path::Path;

const EMBEDDED_EN: &str = include_str!("../resources/translations/en.json");

#[derive(Debug, Clone, Default)]
pub struct Translations {
    messages: HashMap<String, String>,
}

impl Translations {
    /// The English table compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_EN)
    }

    /// Parse a flat `key -> message` JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            messages: serde_json::from_str(json)?,
        })
    }

    /// Load a table from disk, layered over the embedded one
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut translations = Self::embedded()?;
        let overrides: HashMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(path)?)?;
        translations.messages.extend(overrides);
        Ok(translations)
    }

    /// Whether `key` has a message
    pub fn contains(&self, key: &str) -> bool {
        self.messages.contains_key(key)
    }

    /// Message for `key`, or the key itself when missing
    pub fn get(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Translate and substitute `{name}` placeholders
    pub fn format<K: AsRef<str>, V: AsRef<str>>(&self, key: &str, args: &[(K, V)]) -> String {
        args.iter().fold(self.get(key), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name.as_ref()), value.as_ref())
        })
    }

    /// Display label of an enum value
    pub fn enum_label<E: DbEnum>(&self, value: E) -> String {
        self.get(&value.translation_key())
    }

    /// Translated message for a validation error
    pub fn validation_message(&self, error: &ValidationError) -> String {
        self.format(error.translation_key(), &error.arguments())
    }
}
