//! Report columns

use super::filter::{FilterData, FilterMode};
use crate::core::error::{DatabaseError, Result};
use crate::core::query_builder::SqlFragment;
use crate::core::registry::{DbEnum, EnumDescriptor};
use crate::core::value::DatabaseValue;

/// What a column holds, which decides how filter text is converted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    /// Stored enum; filter text is parsed leniently and encoded
    Enum(&'static EnumDescriptor),
}

/// A column shown by a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportColumn {
    key: String,
    label_key: String,
    expr: String,
    kind: ColumnKind,
    sortable: bool,
    filterable: bool,
}

impl ReportColumn {
    /// `expr` is the SQL expression filtered and sorted on; results carry it
    /// under `key`
    pub fn new(key: impl Into<String>, expr: impl Into<String>, kind: ColumnKind) -> Self {
        let key = key.into();
        Self {
            label_key: format!("column.{}", key),
            key,
            expr: expr.into(),
            kind,
            sortable: true,
            filterable: true,
        }
    }

    /// Free text column
    pub fn text(key: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(key, expr, ColumnKind::Text)
    }

    /// Integer column
    pub fn integer(key: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(key, expr, ColumnKind::Integer)
    }

    /// Floating point column
    pub fn real(key: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(key, expr, ColumnKind::Real)
    }

    /// Boolean column
    pub fn boolean(key: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(key, expr, ColumnKind::Boolean)
    }

    /// Column holding a stored enum; filter text is matched through its descriptor
    pub fn enumeration<E: DbEnum>(key: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(key, expr, ColumnKind::Enum(E::DESCRIPTOR))
    }

    #[must_use]
    pub fn label(mut self, key: impl Into<String>) -> Self {
        self.label_key = key.into();
        self
    }

    #[must_use]
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    #[must_use]
    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    /// Key of the column in result rows and report state
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Translation key of the header
    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    /// SQL expression the column selects
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Value kind, used to convert filter text
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Whether the column can be sorted on
    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    /// Whether the column accepts a filter
    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    /// `expr AS "key"`
    pub fn select_expr(&self) -> String {
        format!("{} AS \"{}\"", self.expr, self.key)
    }

    /// Condition implementing `filter`, bound under `param`
    ///
    /// `None` when the filter does not restrict the query.
    ///
    /// # Errors
    ///
    /// Filter text that does not convert to the column's kind: `TypeMismatch`
    /// for numbers and booleans, `UnknownEnumValue` for enums.
    pub fn filter_fragment(&self, filter: &FilterData, param: &str) -> Result<Option<SqlFragment>> {
        let predicate = match filter.text() {
            Some(text) => Some(self.predicate(filter.mode, text, param)?),
            None => None,
        };
        Ok(SqlFragment::with_null_handling(
            predicate,
            &self.expr,
            filter.null_handling,
        ))
    }

    fn predicate(&self, mode: FilterMode, text: &str, param: &str) -> Result<SqlFragment> {
        let value = self.convert(text)?;
        let pattern_mode = matches!(self.kind, ColumnKind::Text)
            && matches!(mode, FilterMode::Contains | FilterMode::StartsWith);

        if pattern_mode {
            let escaped = escape_like(text);
            let pattern = match mode {
                FilterMode::StartsWith => format!("{}%", escaped),
                _ => format!("%{}%", escaped),
            };
            return Ok(
                SqlFragment::new(format!("{} LIKE :{} ESCAPE '\\'", self.expr, param))
                    .bind(param, pattern),
            );
        }

        let op = match mode {
            FilterMode::Contains | FilterMode::StartsWith | FilterMode::Equals => "=",
            FilterMode::NotEquals => "!=",
            FilterMode::GreaterOrEqual => ">=",
            FilterMode::LessOrEqual => "<=",
        };
        Ok(SqlFragment::new(format!("{} {} :{}", self.expr, op, param)).bind(param, value))
    }

    fn convert(&self, text: &str) -> Result<DatabaseValue> {
        match self.kind {
            ColumnKind::Text => Ok(DatabaseValue::String(text.to_string())),
            ColumnKind::Integer => text
                .parse::<i64>()
                .map(DatabaseValue::Long)
                .map_err(|_| DatabaseError::type_mismatch("integer", text)),
            ColumnKind::Real => text
                .parse::<f64>()
                .map(DatabaseValue::Double)
                .map_err(|_| DatabaseError::type_mismatch("number", text)),
            ColumnKind::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(DatabaseValue::Long(1)),
                "false" | "no" | "0" => Ok(DatabaseValue::Long(0)),
                _ => Err(DatabaseError::type_mismatch("boolean", text)),
            },
            ColumnKind::Enum(descriptor) => {
                let variant = descriptor
                    .parse_lenient(text)
                    .ok_or_else(|| DatabaseError::unknown_enum_value(descriptor.name, text))?;
                Ok(DatabaseValue::String(descriptor.encode(variant)?))
            }
        }
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
