//! Row to record mapping
//!
//! Each mapped type declares a [`TypeDescriptor`]: its fields, their types and
//! nullability, and the naming convention that turns a field name into a
//! column name. [`map_row`] checks a raw row against that table and produces a
//! [`Record`] whose values are already validated and normalised; the type's
//! [`FromRecord`] impl then only picks fields out of it.

use super::error::{DatabaseError, Result};
use super::naming::NamingConvention;
use super::query_builder::ColumnInfo;
use super::registry::{DbEnum, EnumDescriptor};
use super::value::{DatabaseRow, DatabaseValue};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Declared type of a mapped field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    /// Boolean (SQLite stores 0/1)
    Bool,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Floating point
    Double,
    /// Text
    Text,
    /// Binary data
    Bytes,
    /// Timestamp (microseconds or RFC 3339 text)
    Timestamp,
    /// Database enum
    Enum(&'static EnumDescriptor),
    /// Nested composite type
    Composite(&'static TypeDescriptor),
}

impl FieldType {
    fn label(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Text => "text",
            FieldType::Bytes => "bytes",
            FieldType::Timestamp => "timestamp",
            FieldType::Enum(d) => d.name,
            FieldType::Composite(d) => d.name,
        }
    }
}

/// One field of a mapped type
#[derive(Debug, PartialEq)]
pub struct FieldDescriptor {
    /// Field name as written in code (`primaryTitle` or `primary_title`)
    pub name: &'static str,
    /// Declared type
    pub ty: FieldType,
    /// Whether a missing column or NULL is acceptable
    pub nullable: bool,
}

impl FieldDescriptor {
    /// A non-nullable field
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    /// A nullable field
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// Explicit mapping table of a record or composite type
#[derive(Debug, PartialEq)]
pub struct TypeDescriptor {
    /// Type name, also the registry key
    pub name: &'static str,
    /// Owning table, used to find `table.column` keys from joined queries
    pub table: Option<&'static str>,
    /// Spelling of column names
    pub convention: NamingConvention,
    /// Fields in declaration order
    pub fields: &'static [FieldDescriptor],
}

impl TypeDescriptor {
    /// Column name for a field name
    pub fn column_name(&self, field: &str) -> String {
        self.convention.apply(field)
    }

    /// Look up a field by its code-level name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Result columns that select every field of this type
    pub fn columns(&self) -> Vec<ColumnInfo> {
        self.fields
            .iter()
            .map(|f| {
                let column = self.column_name(f.name);
                match self.table {
                    Some(table) => ColumnInfo::new(table, column),
                    None => ColumnInfo::bare(column),
                }
            })
            .collect()
    }

    /// Build a composite value from code-level field names
    ///
    /// Names are converted with the type's convention, so the stored object
    /// reads back through [`map_row`].
    pub fn composite_value<I, K>(&self, fields: I) -> DatabaseValue
    where
        I: IntoIterator<Item = (K, DatabaseValue)>,
        K: AsRef<str>,
    {
        DatabaseValue::Composite(
            fields
                .into_iter()
                .map(|(name, value)| (self.column_name(name.as_ref()), value))
                .collect(),
        )
    }
}

/// A type that can be built from a mapped row
pub trait FromRecord: Sized {
    /// Mapping table of the type
    const DESCRIPTOR: &'static TypeDescriptor;

    /// Build the value from a validated record
    fn from_record(record: &Record) -> Result<Self>;

    /// Map and build in one step
    fn from_row(row: &DatabaseRow) -> Result<Self> {
        Self::from_record(&map_row(row, Self::DESCRIPTOR)?)
    }
}

/// A validated field value
#[derive(Debug, Clone, PartialEq)]
pub enum MappedValue {
    /// Column absent or NULL on a nullable field
    Null,
    /// Scalar, normalised to the field's declared type
    Value(DatabaseValue),
    /// Enum, as its code-level variant name
    Enum(&'static str),
    /// Nested composite
    Composite(Record),
}

impl MappedValue {
    fn kind(&self) -> &'static str {
        match self {
            MappedValue::Null => "null",
            MappedValue::Value(v) => v.type_name(),
            MappedValue::Enum(_) => "enum",
            MappedValue::Composite(_) => "composite",
        }
    }
}

/// Fields of one mapped row, keyed by code-level field name
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: &'static str,
    fields: BTreeMap<&'static str, MappedValue>,
}

impl Record {
    /// Type the record was mapped as
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Raw access to a mapped field
    pub fn get(&self, field: &str) -> Result<&MappedValue> {
        self.fields
            .get(field)
            .ok_or_else(|| DatabaseError::missing_field(self.type_name, field, field))
    }

    fn scalar(&self, field: &str, expected: &str) -> Result<Option<&DatabaseValue>> {
        match self.get(field)? {
            MappedValue::Null => Ok(None),
            MappedValue::Value(v) => Ok(Some(v)),
            other => Err(self.mismatch(field, expected, other.kind())),
        }
    }

    fn mismatch(&self, field: &str, expected: &str, actual: &str) -> DatabaseError {
        DatabaseError::type_mismatch(
            &format!("{} for {}.{}", expected, self.type_name, field),
            actual,
        )
    }

    fn required<T>(&self, field: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| DatabaseError::missing_field(self.type_name, field, field))
    }

    /// Nullable boolean
    pub fn opt_bool(&self, field: &str) -> Result<Option<bool>> {
        match self.scalar(field, "bool")? {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.mismatch(field, "bool", v.type_name())),
        }
    }

    /// Boolean
    pub fn bool(&self, field: &str) -> Result<bool> {
        let value = self.opt_bool(field)?;
        self.required(field, value)
    }

    /// Nullable 64-bit integer
    pub fn opt_long(&self, field: &str) -> Result<Option<i64>> {
        match self.scalar(field, "long")? {
            None => Ok(None),
            Some(DatabaseValue::Long(v)) => Ok(Some(*v)),
            Some(DatabaseValue::Int(v)) => Ok(Some(*v as i64)),
            Some(v) => Err(self.mismatch(field, "long", v.type_name())),
        }
    }

    /// 64-bit integer
    pub fn long(&self, field: &str) -> Result<i64> {
        let value = self.opt_long(field)?;
        self.required(field, value)
    }

    /// Nullable 32-bit integer
    pub fn opt_int(&self, field: &str) -> Result<Option<i32>> {
        match self.opt_long(field)? {
            None => Ok(None),
            Some(v) => i32::try_from(v)
                .map(Some)
                .map_err(|_| self.mismatch(field, "int", "long")),
        }
    }

    /// 32-bit integer
    pub fn int(&self, field: &str) -> Result<i32> {
        let value = self.opt_int(field)?;
        self.required(field, value)
    }

    /// Nullable float
    pub fn opt_double(&self, field: &str) -> Result<Option<f64>> {
        match self.scalar(field, "double")? {
            None => Ok(None),
            Some(v) => v
                .as_double()
                .map(Some)
                .ok_or_else(|| self.mismatch(field, "double", v.type_name())),
        }
    }

    /// Float
    pub fn double(&self, field: &str) -> Result<f64> {
        let value = self.opt_double(field)?;
        self.required(field, value)
    }

    /// Nullable text
    pub fn opt_string(&self, field: &str) -> Result<Option<String>> {
        match self.scalar(field, "text")? {
            None => Ok(None),
            Some(DatabaseValue::String(s)) => Ok(Some(s.clone())),
            Some(v) => Err(self.mismatch(field, "text", v.type_name())),
        }
    }

    /// Text
    pub fn string(&self, field: &str) -> Result<String> {
        let value = self.opt_string(field)?;
        self.required(field, value)
    }

    /// Nullable blob
    pub fn opt_bytes(&self, field: &str) -> Result<Option<Vec<u8>>> {
        match self.scalar(field, "bytes")? {
            None => Ok(None),
            Some(DatabaseValue::Bytes(b)) => Ok(Some(b.clone())),
            Some(v) => Err(self.mismatch(field, "bytes", v.type_name())),
        }
    }

    /// Nullable UTC timestamp
    pub fn opt_timestamp(&self, field: &str) -> Result<Option<DateTime<Utc>>> {
        match self.scalar(field, "timestamp")? {
            None => Ok(None),
            Some(v) => v
                .as_datetime()
                .map(Some)
                .ok_or_else(|| self.mismatch(field, "timestamp", v.type_name())),
        }
    }

    /// UTC timestamp
    pub fn timestamp(&self, field: &str) -> Result<DateTime<Utc>> {
        let value = self.opt_timestamp(field)?;
        self.required(field, value)
    }

    /// Nullable enum decoded through its descriptor
    pub fn opt_enum<E: DbEnum>(&self, field: &str) -> Result<Option<E>> {
        match self.get(field)? {
            MappedValue::Null => Ok(None),
            MappedValue::Enum(name) => E::from_code_name(name)
                .map(Some)
                .ok_or_else(|| DatabaseError::unknown_enum_value(E::DESCRIPTOR.name, name)),
            other => Err(self.mismatch(field, E::DESCRIPTOR.name, other.kind())),
        }
    }

    /// Enum decoded through its descriptor
    pub fn enum_value<E: DbEnum>(&self, field: &str) -> Result<E> {
        let value = self.opt_enum(field)?;
        self.required(field, value)
    }

    /// Nullable composite mapped through `T`'s descriptor
    pub fn opt_composite<T: FromRecord>(&self, field: &str) -> Result<Option<T>> {
        match self.get(field)? {
            MappedValue::Null => Ok(None),
            MappedValue::Composite(record) => T::from_record(record).map(Some),
            other => Err(self.mismatch(field, T::DESCRIPTOR.name, other.kind())),
        }
    }

    /// Composite mapped through `T`'s descriptor
    pub fn composite<T: FromRecord>(&self, field: &str) -> Result<T> {
        let value = self.opt_composite(field)?;
        self.required(field, value)
    }
}

/// Map a raw row onto a type's mapping table
///
/// # Errors
///
/// - [`DatabaseError::MissingField`] when a non-nullable field has no column
///   or the column is NULL
/// - [`DatabaseError::TypeMismatch`] when a raw value cannot represent the
///   field's declared type
/// - [`DatabaseError::UnknownEnumValue`] when enum text matches no variant
pub fn map_row(row: &DatabaseRow, descriptor: &'static TypeDescriptor) -> Result<Record> {
    map_fields(row, descriptor, descriptor.table)
}

/// Map every row as `T`
pub fn map_rows<T: FromRecord>(rows: &[DatabaseRow]) -> Result<Vec<T>> {
    rows.iter().map(T::from_row).collect()
}

fn map_fields(
    row: &DatabaseRow,
    descriptor: &'static TypeDescriptor,
    table: Option<&str>,
) -> Result<Record> {
    let mut fields = BTreeMap::new();

    for field in descriptor.fields {
        let column = descriptor.column_name(field.name);
        let raw = lookup(row, table, &column).filter(|v| !v.is_null());

        let value = match raw {
            Some(raw) => convert(descriptor, field, raw)?,
            None if field.nullable => MappedValue::Null,
            None => {
                return Err(DatabaseError::missing_field(
                    descriptor.name,
                    field.name,
                    &column,
                ))
            }
        };
        fields.insert(field.name, value);
    }

    Ok(Record {
        type_name: descriptor.name,
        fields,
    })
}

fn lookup<'a>(row: &'a DatabaseRow, table: Option<&str>, column: &str) -> Option<&'a DatabaseValue> {
    if let Some(table) = table {
        if let Some(value) = row.get(&format!("{}.{}", table, column)) {
            return Some(value);
        }
    }
    row.get(column)
}

fn convert(
    descriptor: &TypeDescriptor,
    field: &FieldDescriptor,
    raw: &DatabaseValue,
) -> Result<MappedValue> {
    let mismatch = || {
        DatabaseError::type_mismatch(
            &format!("{} for {}.{}", field.ty.label(), descriptor.name, field.name),
            raw.type_name(),
        )
    };

    let value = match (field.ty, raw) {
        (FieldType::Bool, DatabaseValue::Bool(v)) => DatabaseValue::Bool(*v),
        (FieldType::Bool, DatabaseValue::Int(0)) | (FieldType::Bool, DatabaseValue::Long(0)) => {
            DatabaseValue::Bool(false)
        }
        (FieldType::Bool, DatabaseValue::Int(1)) | (FieldType::Bool, DatabaseValue::Long(1)) => {
            DatabaseValue::Bool(true)
        }
        (FieldType::Int, DatabaseValue::Int(v)) => DatabaseValue::Long(*v as i64),
        (FieldType::Int, DatabaseValue::Long(v)) if i32::try_from(*v).is_ok() => {
            DatabaseValue::Long(*v)
        }
        (FieldType::Long, DatabaseValue::Int(v)) => DatabaseValue::Long(*v as i64),
        (FieldType::Long, DatabaseValue::Long(v)) => DatabaseValue::Long(*v),
        (FieldType::Double, v @ (DatabaseValue::Double(_)
        | DatabaseValue::Float(_)
        | DatabaseValue::Int(_)
        | DatabaseValue::Long(_))) => DatabaseValue::Double(v.as_double().ok_or_else(mismatch)?),
        (FieldType::Text, DatabaseValue::String(s)) => DatabaseValue::String(s.clone()),
        (FieldType::Bytes, DatabaseValue::Bytes(b)) => DatabaseValue::Bytes(b.clone()),
        (FieldType::Timestamp, DatabaseValue::Timestamp(v))
        | (FieldType::Timestamp, DatabaseValue::Long(v)) => DatabaseValue::Timestamp(*v),
        (FieldType::Timestamp, v @ DatabaseValue::String(_)) => {
            DatabaseValue::Timestamp(v.as_datetime().ok_or_else(mismatch)?.timestamp_micros())
        }
        (FieldType::Enum(enum_descriptor), DatabaseValue::String(s)) => {
            return Ok(MappedValue::Enum(enum_descriptor.decode(s)?));
        }
        (FieldType::Composite(inner), DatabaseValue::Composite(nested)) => {
            return Ok(MappedValue::Composite(map_fields(nested, inner, None)?));
        }
        (FieldType::Composite(inner), DatabaseValue::String(text)) => {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|_| mismatch())?;
            return match DatabaseValue::from_json(&json) {
                DatabaseValue::Composite(nested) => {
                    Ok(MappedValue::Composite(map_fields(&nested, inner, None)?))
                }
                _ => Err(mismatch()),
            };
        }
        _ => return Err(mismatch()),
    };

    Ok(MappedValue::Value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::db_enum! {
        enum Status as "status" with SnakeCase {
            PlanToRead,
            Reading,
        }
    }

    const PROGRESS: TypeDescriptor = TypeDescriptor {
        name: "progress",
        table: None,
        convention: NamingConvention::SnakeCase,
        fields: &[
            FieldDescriptor::required("chapter", FieldType::Long),
            FieldDescriptor::optional("volume", FieldType::Long),
            FieldDescriptor::required("status", FieldType::Enum(Status::DESCRIPTOR)),
        ],
    };

    const ENTRY: TypeDescriptor = TypeDescriptor {
        name: "entry",
        table: Some("entries"),
        convention: NamingConvention::SnakeCase,
        fields: &[
            FieldDescriptor::required("id", FieldType::Long),
            FieldDescriptor::required("primaryTitle", FieldType::Text),
            FieldDescriptor::optional("score", FieldType::Double),
            FieldDescriptor::optional("progress", FieldType::Composite(&PROGRESS)),
        ],
    };

    #[derive(Debug, PartialEq)]
    struct Progress {
        chapter: i64,
        volume: Option<i64>,
        status: Status,
    }

    impl FromRecord for Progress {
        const DESCRIPTOR: &'static TypeDescriptor = &PROGRESS;

        fn from_record(record: &Record) -> Result<Self> {
            Ok(Self {
                chapter: record.long("chapter")?,
                volume: record.opt_long("volume")?,
                status: record.enum_value("status")?,
            })
        }
    }

    #[derive(Debug, PartialEq)]
    struct Entry {
        id: i64,
        primary_title: String,
        score: Option<f64>,
        progress: Option<Progress>,
    }

    impl FromRecord for Entry {
        const DESCRIPTOR: &'static TypeDescriptor = &ENTRY;

        fn from_record(record: &Record) -> Result<Self> {
            Ok(Self {
                id: record.long("id")?,
                primary_title: record.string("primaryTitle")?,
                score: record.opt_double("score")?,
                progress: record.opt_composite("progress")?,
            })
        }
    }

    fn row(pairs: &[(&str, DatabaseValue)]) -> DatabaseRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_maps_nested_composite_from_json_text() {
        let row = row(&[
            ("id", DatabaseValue::Long(7)),
            ("primary_title", DatabaseValue::from("Solo Leveling")),
            ("score", DatabaseValue::Long(9)),
            (
                "progress",
                DatabaseValue::from(r#"{"chapter": 110, "volume": null, "status": "reading"}"#),
            ),
        ]);

        let entry = Entry::from_row(&row).unwrap();
        assert_eq!(
            entry,
            Entry {
                id: 7,
                primary_title: "Solo Leveling".to_string(),
                score: Some(9.0),
                progress: Some(Progress {
                    chapter: 110,
                    volume: None,
                    status: Status::Reading,
                }),
            }
        );
    }

    #[test]
    fn test_table_qualified_columns_win() {
        let row = row(&[
            ("entries.id", DatabaseValue::Long(1)),
            ("id", DatabaseValue::Long(99)),
            ("entries.primary_title", DatabaseValue::from("A")),
        ]);

        let entry = Entry::from_row(&row).unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(entry.progress, None);
    }

    #[test]
    fn test_missing_required_field() {
        let row = row(&[("id", DatabaseValue::Long(1))]);
        let err = Entry::from_row(&row).unwrap_err();
        match err {
            DatabaseError::MissingField { field, column, .. } => {
                assert_eq!(field, "primaryTitle");
                assert_eq!(column, "primary_title");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_null_in_required_field_is_missing() {
        let row = row(&[
            ("id", DatabaseValue::Null),
            ("primary_title", DatabaseValue::from("A")),
        ]);
        assert!(matches!(
            Entry::from_row(&row),
            Err(DatabaseError::MissingField { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let row = row(&[
            ("id", DatabaseValue::from("seven")),
            ("primary_title", DatabaseValue::from("A")),
        ]);
        assert!(matches!(
            Entry::from_row(&row),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_enum_inside_composite() {
        let mut progress = DatabaseRow::new();
        progress.insert("chapter".to_string(), DatabaseValue::Long(1));
        progress.insert("status".to_string(), DatabaseValue::from("dropped"));
        let row = row(&[
            ("id", DatabaseValue::Long(1)),
            ("primary_title", DatabaseValue::from("A")),
            ("progress", DatabaseValue::Composite(progress)),
        ]);
        assert!(matches!(
            Entry::from_row(&row),
            Err(DatabaseError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn test_composite_value_uses_convention() {
        let value = PROGRESS.composite_value([
            ("chapter", DatabaseValue::Long(3)),
            ("status", DatabaseValue::from(Status::PlanToRead)),
        ]);
        let fields = value.as_composite().unwrap();
        assert_eq!(fields["status"], DatabaseValue::from("plan_to_read"));
    }

    #[test]
    fn test_columns_are_table_qualified() {
        let columns: Vec<String> = ENTRY.columns().iter().map(|c| c.select_expr()).collect();
        assert_eq!(columns[1], "entries.primary_title AS \"entries.primary_title\"");
    }
}
