//! Filter and sort state of a report

use crate::core::query_builder::{NullHandling, OrderDirection};
use serde::{Deserialize, Serialize};

/// How the filter value is compared with the column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterMode {
    /// Case-insensitive substring match
    #[default]
    Contains,
    StartsWith,
    Equals,
    NotEquals,
    GreaterOrEqual,
    LessOrEqual,
}

/// The filter a user set on one column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterData {
    /// Filter text; blank counts as no value
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default)]
    pub null_handling: NullHandling,
}

impl FilterData {
    /// Filter on `value` with the default mode and null handling
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn null_handling(mut self, null_handling: NullHandling) -> Self {
        self.null_handling = null_handling;
        self
    }

    /// Only null handling, no value
    pub fn nulls(null_handling: NullHandling) -> Self {
        Self {
            null_handling,
            ..Self::default()
        }
    }

    /// The trimmed value, `None` when missing or blank
    pub fn text(&self) -> Option<&str> {
        self.value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Whether the filter restricts the query at all
    pub fn is_active(&self) -> bool {
        self.text().is_some() || self.null_handling == NullHandling::ExcludeNull
    }
}

/// Sort column and direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortConfiguration {
    pub column: String,
    pub direction: OrderDirection,
}

impl SortConfiguration {
    /// Sort on `column` in `direction`
    pub fn new(column: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Ascending sort on `column`
    pub fn ascending(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Asc)
    }

    /// Descending sort on `column`
    pub fn descending(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Desc)
    }
}
