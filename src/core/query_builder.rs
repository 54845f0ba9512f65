//! Type-safe SQL query builder
//!
//! Provides a fluent API for building SQL queries with named parameter binding
//! to prevent SQL injection attacks. Builder-generated values are bound as
//! `:p0`, `:p1`, ...; [`SqlFragment`]s and placeholders bring their own names,
//! which must not start with `p` followed by a digit.

use super::database::Executor;
use super::error::{DatabaseError, Result};
use super::mapping::{map_rows, FromRecord, TypeDescriptor};
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named parameter values, keyed without the leading `:`
pub type QueryParams = BTreeMap<String, DatabaseValue>;

/// SQL text together with its bound parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuiltQuery {
    /// SQL with `:name` placeholders
    pub sql: String,
    /// Values for the placeholders
    pub params: QueryParams,
}

impl BuiltQuery {
    /// A query with no parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: QueryParams::new(),
        }
    }

    /// Bind a named parameter (`name` without the `:`)
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// A piece of SQL carrying its own named parameters
///
/// Fragments are spliced into WHERE clauses wrapped in parentheses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    sql: String,
    params: QueryParams,
}

impl SqlFragment {
    /// Create a fragment from SQL text
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: QueryParams::new(),
        }
    }

    /// Bind a named parameter used by the fragment
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(column: &str) -> Self {
        Self::new(format!("{} IS NOT NULL", column))
    }

    /// `(self OR column IS NULL)`
    #[must_use]
    pub fn or_is_null(self, column: &str) -> Self {
        Self {
            sql: format!("({} OR {} IS NULL)", self.sql, column),
            params: self.params,
        }
    }

    /// `(self AND column IS NOT NULL)`
    #[must_use]
    pub fn and_is_not_null(self, column: &str) -> Self {
        Self {
            sql: format!("({} AND {} IS NOT NULL)", self.sql, column),
            params: self.params,
        }
    }

    /// Combine a filter predicate with a null-handling policy
    ///
    /// Returns `None` when the combination does not restrict the query.
    pub fn with_null_handling(
        predicate: Option<SqlFragment>,
        column: &str,
        mode: NullHandling,
    ) -> Option<SqlFragment> {
        match (predicate, mode) {
            (Some(p), NullHandling::Ignore) => Some(p),
            (Some(p), NullHandling::IncludeNull) => Some(p.or_is_null(column)),
            (Some(p), NullHandling::ExcludeNull) => Some(p.and_is_not_null(column)),
            (None, NullHandling::ExcludeNull) => Some(Self::is_not_null(column)),
            (None, NullHandling::Ignore | NullHandling::IncludeNull) => None,
        }
    }

    /// The SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The fragment's own parameters
    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

/// How a filter treats rows whose column is NULL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NullHandling {
    /// NULL rows follow the predicate (and so never match it)
    #[default]
    Ignore,
    /// NULL rows always pass
    IncludeNull,
    /// NULL rows never pass
    ExcludeNull,
}

/// A result column, optionally qualified by its table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnInfo {
    /// Owning table
    pub table: Option<String>,
    /// Column name
    pub name: String,
}

impl ColumnInfo {
    /// A table-qualified column
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// An unqualified column
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// `table.name`, or `name` when unqualified
    pub fn qualified(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", table, self.name),
            None => self.name.clone(),
        }
    }

    /// Select expression keeping the qualified name as the result key
    pub fn select_expr(&self) -> String {
        match &self.table {
            Some(_) => format!("{} AS \"{}\"", self.qualified(), self.qualified()),
            None => self.name.clone(),
        }
    }
}

/// SQL comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal to (=)
    Eq,
    /// Not equal to (<> or !=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// LIKE pattern matching
    Like,
}

impl Operator {
    fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
        }
    }
}

/// A bound value or a placeholder left for later binding
#[derive(Debug, Clone)]
enum Arg {
    Value(DatabaseValue),
    Named(String),
}

/// WHERE clause condition
#[derive(Debug, Clone)]
enum Condition {
    Compare {
        column: String,
        operator: Operator,
        arg: Arg,
    },
    In {
        column: String,
        values: Vec<DatabaseValue>,
    },
    Null {
        column: String,
        negated: bool,
    },
    Fragment(SqlFragment),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Logic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Default)]
struct WhereClause {
    conditions: Vec<Condition>,
    logic: Logic,
}

impl WhereClause {
    fn render(&self, writer: &mut ParamWriter) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }

        let separator = match self.logic {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        };

        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|cond| match cond {
                Condition::Compare {
                    column,
                    operator,
                    arg,
                } => format!("{} {} {}", column, operator.as_sql(), writer.arg(arg)),
                // Nothing is a member of the empty set
                Condition::In { values, .. } if values.is_empty() => "0 = 1".to_string(),
                Condition::In { column, values } => {
                    let names: Vec<String> =
                        values.iter().map(|v| writer.push(v.clone())).collect();
                    format!("{} IN ({})", column, names.join(", "))
                }
                Condition::Null { column, negated } => {
                    if *negated {
                        format!("{} IS NOT NULL", column)
                    } else {
                        format!("{} IS NULL", column)
                    }
                }
                Condition::Fragment(fragment) => {
                    writer.merge(fragment.params());
                    format!("({})", fragment.sql())
                }
            })
            .collect();

        format!(" WHERE {}", parts.join(separator))
    }
}

/// Allocates `:pN` names while rendering
#[derive(Debug, Default)]
struct ParamWriter {
    params: QueryParams,
    next: usize,
}

impl ParamWriter {
    fn push(&mut self, value: DatabaseValue) -> String {
        let name = format!("p{}", self.next);
        self.next += 1;
        self.params.insert(name.clone(), value);
        format!(":{}", name)
    }

    fn arg(&mut self, arg: &Arg) -> String {
        match arg {
            Arg::Value(value) => self.push(value.clone()),
            Arg::Named(name) => format!(":{}", name),
        }
    }

    fn merge(&mut self, params: &QueryParams) {
        self.params
            .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

fn returning_clause(columns: &[String]) -> String {
    if columns.is_empty() {
        String::new()
    } else {
        format!(" RETURNING {}", columns.join(", "))
    }
}

/// WHERE methods shared by SELECT, UPDATE and DELETE builders
macro_rules! where_methods {
    () => {
        fn compare(mut self, column: &str, operator: Operator, arg: Arg) -> Self {
            self.where_clause.conditions.push(Condition::Compare {
                column: column.to_string(),
                operator,
                arg,
            });
            self
        }

        /// Add a WHERE column = value condition
        #[must_use]
        pub fn where_eq(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
            self.compare(column, Operator::Eq, Arg::Value(value.into()))
        }

        /// Add a WHERE column != value condition
        #[must_use]
        pub fn where_ne(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
            self.compare(column, Operator::Ne, Arg::Value(value.into()))
        }

        /// Add a WHERE column > value condition
        #[must_use]
        pub fn where_gt(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
            self.compare(column, Operator::Gt, Arg::Value(value.into()))
        }

        /// Add a WHERE column >= value condition
        #[must_use]
        pub fn where_ge(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
            self.compare(column, Operator::Ge, Arg::Value(value.into()))
        }

        /// Add a WHERE column < value condition
        #[must_use]
        pub fn where_lt(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
            self.compare(column, Operator::Lt, Arg::Value(value.into()))
        }

        /// Add a WHERE column <= value condition
        #[must_use]
        pub fn where_le(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
            self.compare(column, Operator::Le, Arg::Value(value.into()))
        }

        /// Add a WHERE column LIKE pattern condition
        #[must_use]
        pub fn where_like(self, column: &str, pattern: &str) -> Self {
            self.compare(
                column,
                Operator::Like,
                Arg::Value(DatabaseValue::String(pattern.to_string())),
            )
        }

        /// Add a WHERE column = :name condition bound later
        #[must_use]
        pub fn where_eq_placeholder(self, column: &str, name: &str) -> Self {
            self.compare(column, Operator::Eq, Arg::Named(name.to_string()))
        }

        /// Add a WHERE column IN (...) condition
        ///
        /// An empty set matches no rows.
        #[must_use]
        pub fn where_in<I, V>(mut self, column: &str, values: I) -> Self
        where
            I: IntoIterator<Item = V>,
            V: Into<DatabaseValue>,
        {
            self.where_clause.conditions.push(Condition::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
            });
            self
        }

        /// Add a WHERE column IS NULL condition
        #[must_use]
        pub fn where_null(mut self, column: &str) -> Self {
            self.where_clause.conditions.push(Condition::Null {
                column: column.to_string(),
                negated: false,
            });
            self
        }

        /// Add a WHERE column IS NOT NULL condition
        #[must_use]
        pub fn where_not_null(mut self, column: &str) -> Self {
            self.where_clause.conditions.push(Condition::Null {
                column: column.to_string(),
                negated: true,
            });
            self
        }

        /// Add an arbitrary fragment, wrapped in parentheses
        #[must_use]
        pub fn where_fragment(mut self, fragment: SqlFragment) -> Self {
            self.where_clause
                .conditions
                .push(Condition::Fragment(fragment));
            self
        }

        /// Use OR logic for WHERE conditions instead of AND
        #[must_use]
        pub fn or_where(mut self) -> Self {
            self.where_clause.logic = Logic::Or;
            self
        }
    };
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN
    Inner,
    /// LEFT JOIN
    Left,
}

impl JoinType {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// JOIN clause
#[derive(Debug, Clone)]
pub struct Join {
    join_type: JoinType,
    table: String,
    on_condition: String,
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDirection {
    /// Ascending order
    Asc,
    /// Descending order
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }

    /// The opposite direction
    pub fn reversed(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }
}

/// SELECT query builder
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    distinct: bool,
    joins: Vec<Join>,
    where_clause: WhereClause,
    group_by: Vec<String>,
    order_by: Vec<(String, OrderDirection)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SelectBuilder {
    /// Create a new SELECT query builder
    ///
    /// # Example
    ///
    /// ```
    /// use media_catalog::core::query_builder::SelectBuilder;
    ///
    /// let query = SelectBuilder::new("games")
    ///     .columns(&["id", "title"])
    ///     .where_eq("status", "Playing")
    ///     .to_query();
    ///
    /// assert_eq!(query.sql, "SELECT id, title FROM games WHERE status = :p0");
    /// ```
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            distinct: false,
            joins: Vec::new(),
            where_clause: WhereClause::default(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Select specific columns
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Select result columns, keeping qualified names distinct
    #[must_use]
    pub fn column_infos(mut self, columns: &[ColumnInfo]) -> Self {
        self.columns = columns.iter().map(ColumnInfo::select_expr).collect();
        self
    }

    /// Add every column of a mapped type to the selection
    #[must_use]
    pub fn select_type(mut self, descriptor: &TypeDescriptor) -> Self {
        if self.columns == ["*"] {
            self.columns.clear();
        }
        self.columns
            .extend(descriptor.columns().iter().map(ColumnInfo::select_expr));
        self
    }

    /// Select all columns (*)
    #[must_use]
    pub fn all_columns(mut self) -> Self {
        self.columns = vec!["*".to_string()];
        self
    }

    /// SELECT DISTINCT
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    where_methods!();

    /// Add an INNER JOIN
    #[must_use]
    pub fn join(mut self, table: &str, on_condition: &str) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Inner,
            table: table.to_string(),
            on_condition: on_condition.to_string(),
        });
        self
    }

    /// Add a LEFT JOIN
    #[must_use]
    pub fn left_join(mut self, table: &str, on_condition: &str) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Left,
            table: table.to_string(),
            on_condition: on_condition.to_string(),
        });
        self
    }

    /// Add ORDER BY clause
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Add ORDER BY ASC
    #[must_use]
    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Asc)
    }

    /// Add ORDER BY DESC
    #[must_use]
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }

    /// Drop any ORDER BY terms
    #[must_use]
    pub fn clear_order(mut self) -> Self {
        self.order_by.clear();
        self
    }

    /// Add LIMIT clause
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add OFFSET clause
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Add GROUP BY clause
    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    fn render(&self, with_tail: bool) -> (String, QueryParams) {
        let mut writer = ParamWriter::default();
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            self.columns.join(", "),
            self.table
        );

        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {}",
                join.join_type.as_sql(),
                join.table,
                join.on_condition
            ));
        }

        sql.push_str(&self.where_clause.render(&mut writer));

        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }

        if with_tail {
            if !self.order_by.is_empty() {
                let order_clauses: Vec<String> = self
                    .order_by
                    .iter()
                    .map(|(col, dir)| format!("{} {}", col, dir.as_sql()))
                    .collect();
                sql.push_str(&format!(" ORDER BY {}", order_clauses.join(", ")));
            }

            // SQLite only accepts OFFSET after a LIMIT
            match (self.limit, self.offset) {
                (Some(limit), Some(offset)) => {
                    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
                }
                (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
                (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
                (None, None) => {}
            }
        }

        (sql, writer.params)
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        self.render(true).0
    }

    /// Get the named parameter values
    pub fn params(&self) -> QueryParams {
        self.render(true).1
    }

    /// SQL and parameters together
    pub fn to_query(&self) -> BuiltQuery {
        let (sql, params) = self.render(true);
        BuiltQuery { sql, params }
    }

    /// Count the rows the query matches, ignoring ORDER BY, LIMIT and OFFSET
    pub fn count_query(&self) -> BuiltQuery {
        let (inner, params) = self.render(false);
        BuiltQuery {
            sql: format!("SELECT COUNT(*) AS count FROM ({}) AS counted", inner),
            params,
        }
    }

    /// Fetch every matching row
    pub async fn fetch_all<E: Executor + ?Sized>(&self, db: &E) -> Result<DatabaseResult> {
        db.fetch(&self.to_query()).await
    }

    /// Fetch the first matching row, if any
    pub async fn fetch_optional<E: Executor + ?Sized>(
        &self,
        db: &E,
    ) -> Result<Option<DatabaseRow>> {
        Ok(self.fetch_all(db).await?.into_iter().next())
    }

    /// Fetch one column of the first row
    ///
    /// No rows and a NULL value both yield `None`; a row without the column
    /// is an error.
    pub async fn fetch_scalar<E: Executor + ?Sized>(
        &self,
        db: &E,
        field: &str,
    ) -> Result<Option<DatabaseValue>> {
        match self.fetch_optional(db).await? {
            None => Ok(None),
            Some(mut row) => {
                let value = row
                    .remove(field)
                    .ok_or_else(|| DatabaseError::ColumnNotFound(field.to_string()))?;
                Ok((!value.is_null()).then_some(value))
            }
        }
    }

    /// Fetch one column of every row
    pub async fn fetch_column<E: Executor + ?Sized>(
        &self,
        db: &E,
        field: &str,
    ) -> Result<Vec<DatabaseValue>> {
        self.fetch_all(db)
            .await?
            .into_iter()
            .map(|mut row| {
                row.remove(field)
                    .ok_or_else(|| DatabaseError::ColumnNotFound(field.to_string()))
            })
            .collect()
    }

    /// Fetch every row mapped as `T`
    pub async fn fetch_mapped<T, E>(&self, db: &E) -> Result<Vec<T>>
    where
        T: FromRecord,
        E: Executor + ?Sized,
    {
        map_rows(&self.fetch_all(db).await?)
    }

    /// Fetch the first row mapped as `T`
    pub async fn fetch_one_mapped<T, E>(&self, db: &E) -> Result<Option<T>>
    where
        T: FromRecord,
        E: Executor + ?Sized,
    {
        self.fetch_optional(db)
            .await?
            .map(|row| T::from_row(&row))
            .transpose()
    }
}

#[derive(Debug, Clone)]
enum OnConflict {
    DoNothing { target: Vec<String> },
    DoUpdate { target: Vec<String>, update: Vec<String> },
}

/// INSERT query builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Arg>,
    on_conflict: Option<OnConflict>,
    returning: Vec<String>,
}

impl InsertBuilder {
    /// Create a new INSERT query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            on_conflict: None,
            returning: Vec::new(),
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(Arg::Value(value.into()));
        self
    }

    /// Add a column whose value is bound later as `:name`
    #[must_use]
    pub fn value_placeholder(mut self, column: &str, name: &str) -> Self {
        self.columns.push(column.to_string());
        self.values.push(Arg::Named(name.to_string()));
        self
    }

    /// `ON CONFLICT (target) DO NOTHING`; an empty target matches any constraint
    #[must_use]
    pub fn on_conflict_do_nothing(mut self, target: &[&str]) -> Self {
        self.on_conflict = Some(OnConflict::DoNothing {
            target: target.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// `ON CONFLICT (target) DO UPDATE SET col = excluded.col, ...`
    #[must_use]
    pub fn on_conflict_do_update(mut self, target: &[&str], update: &[&str]) -> Self {
        self.on_conflict = Some(OnConflict::DoUpdate {
            target: target.iter().map(|s| s.to_string()).collect(),
            update: update.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add a RETURNING clause
    #[must_use]
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether the statement returns rows
    pub fn has_returning(&self) -> bool {
        !self.returning.is_empty()
    }

    fn render(&self) -> (String, QueryParams) {
        let mut writer = ParamWriter::default();
        let placeholders: Vec<String> = self.values.iter().map(|v| writer.arg(v)).collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        );

        match &self.on_conflict {
            Some(OnConflict::DoNothing { target }) if target.is_empty() => {
                sql.push_str(" ON CONFLICT DO NOTHING")
            }
            Some(OnConflict::DoNothing { target }) => {
                sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", target.join(", ")))
            }
            Some(OnConflict::DoUpdate { target, update }) => {
                let sets: Vec<String> = update
                    .iter()
                    .map(|col| format!("{} = excluded.{}", col, col))
                    .collect();
                sql.push_str(&format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    target.join(", "),
                    sets.join(", ")
                ));
            }
            None => {}
        }

        sql.push_str(&returning_clause(&self.returning));
        (sql, writer.params)
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        self.render().0
    }

    /// Get the parameter values
    pub fn params(&self) -> QueryParams {
        self.render().1
    }

    /// SQL and parameters together
    pub fn to_query(&self) -> BuiltQuery {
        let (sql, params) = self.render();
        BuiltQuery { sql, params }
    }

    /// Run the insert, returning the number of affected rows
    pub async fn execute<E: Executor + ?Sized>(&self, db: &E) -> Result<u64> {
        db.run(&self.to_query()).await
    }

    /// Run the insert and collect its RETURNING rows
    pub async fn fetch_returning<E: Executor + ?Sized>(&self, db: &E) -> Result<DatabaseResult> {
        db.fetch(&self.to_query()).await
    }
}

/// UPDATE query builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    sets: Vec<(String, Arg)>,
    where_clause: WhereClause,
    returning: Vec<String>,
}

impl UpdateBuilder {
    /// Create a new UPDATE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            where_clause: WhereClause::default(),
            returning: Vec::new(),
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.sets
            .push((column.to_string(), Arg::Value(value.into())));
        self
    }

    /// Set a column to a value bound later as `:name`
    #[must_use]
    pub fn set_placeholder(mut self, column: &str, name: &str) -> Self {
        self.sets
            .push((column.to_string(), Arg::Named(name.to_string())));
        self
    }

    where_methods!();

    /// Add a RETURNING clause
    #[must_use]
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether the statement returns rows
    pub fn has_returning(&self) -> bool {
        !self.returning.is_empty()
    }

    fn render(&self) -> (String, QueryParams) {
        let mut writer = ParamWriter::default();
        let set_clauses: Vec<String> = self
            .sets
            .iter()
            .map(|(col, arg)| format!("{} = {}", col, writer.arg(arg)))
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, set_clauses.join(", "));
        sql.push_str(&self.where_clause.render(&mut writer));
        sql.push_str(&returning_clause(&self.returning));
        (sql, writer.params)
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        self.render().0
    }

    /// Get the parameter values (SET values followed by WHERE values)
    pub fn params(&self) -> QueryParams {
        self.render().1
    }

    /// SQL and parameters together
    pub fn to_query(&self) -> BuiltQuery {
        let (sql, params) = self.render();
        BuiltQuery { sql, params }
    }

    /// Run the update, returning the number of affected rows
    pub async fn execute<E: Executor + ?Sized>(&self, db: &E) -> Result<u64> {
        db.run(&self.to_query()).await
    }

    /// Run the update and collect its RETURNING rows
    pub async fn fetch_returning<E: Executor + ?Sized>(&self, db: &E) -> Result<DatabaseResult> {
        db.fetch(&self.to_query()).await
    }
}

/// DELETE query builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    where_clause: WhereClause,
    returning: Vec<String>,
}

impl DeleteBuilder {
    /// Create a new DELETE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: WhereClause::default(),
            returning: Vec::new(),
        }
    }

    where_methods!();

    /// Add a RETURNING clause
    #[must_use]
    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether the statement returns rows
    pub fn has_returning(&self) -> bool {
        !self.returning.is_empty()
    }

    fn render(&self) -> (String, QueryParams) {
        let mut writer = ParamWriter::default();
        let mut sql = format!("DELETE FROM {}", self.table);
        sql.push_str(&self.where_clause.render(&mut writer));
        sql.push_str(&returning_clause(&self.returning));
        (sql, writer.params)
    }

    /// Build the SQL query string
    pub fn build(&self) -> String {
        self.render().0
    }

    /// Get the parameter values
    pub fn params(&self) -> QueryParams {
        self.render().1
    }

    /// SQL and parameters together
    pub fn to_query(&self) -> BuiltQuery {
        let (sql, params) = self.render();
        BuiltQuery { sql, params }
    }

    /// Run the delete, returning the number of affected rows
    pub async fn execute<E: Executor + ?Sized>(&self, db: &E) -> Result<u64> {
        db.run(&self.to_query()).await
    }

    /// Run the delete and collect its RETURNING rows
    pub async fn fetch_returning<E: Executor + ?Sized>(&self, db: &E) -> Result<DatabaseResult> {
        db.fetch(&self.to_query()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_basic() {
        let query = SelectBuilder::new("games").build();
        assert_eq!(query, "SELECT * FROM games");
    }

    #[test]
    fn test_select_columns() {
        let query = SelectBuilder::new("books")
            .columns(&["id", "title", "isbn"])
            .build();
        assert_eq!(query, "SELECT id, title, isbn FROM books");
    }

    #[test]
    fn test_select_where_named_params() {
        let builder = SelectBuilder::new("asian_media")
            .where_eq("id", 42)
            .where_eq("language", "KOREAN");

        assert_eq!(
            builder.build(),
            "SELECT * FROM asian_media WHERE id = :p0 AND language = :p1"
        );
        let params = builder.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params["p0"], DatabaseValue::Int(42));
        assert_eq!(params["p1"], DatabaseValue::from("KOREAN"));
    }

    #[test]
    fn test_select_or_where() {
        let query = SelectBuilder::new("games")
            .where_eq("status", "Playing")
            .where_eq("status", "Backlog")
            .or_where()
            .build();
        assert_eq!(
            query,
            "SELECT * FROM games WHERE status = :p0 OR status = :p1"
        );
    }

    #[test]
    fn test_select_order_limit_offset() {
        let query = SelectBuilder::new("games")
            .order_by_desc("created_at")
            .limit(10)
            .offset(20)
            .build();

        assert_eq!(
            query,
            "SELECT * FROM games ORDER BY created_at DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_where_in() {
        let builder = SelectBuilder::new("games").where_in("status", ["Playing", "Backlog"]);
        assert_eq!(
            builder.build(),
            "SELECT * FROM games WHERE status IN (:p0, :p1)"
        );

        let empty: Vec<i64> = Vec::new();
        let builder = SelectBuilder::new("games").where_in("id", empty);
        assert_eq!(builder.build(), "SELECT * FROM games WHERE 0 = 1");
    }

    #[test]
    fn test_fragment_params_are_merged() {
        let fragment = SqlFragment::new("lower(title) LIKE :title_filter")
            .bind("title_filter", "%solo%");
        let builder = SelectBuilder::new("asian_media_titles")
            .where_eq("media_id", 3)
            .where_fragment(fragment);

        let query = builder.to_query();
        assert_eq!(
            query.sql,
            "SELECT * FROM asian_media_titles WHERE media_id = :p0 AND (lower(title) LIKE :title_filter)"
        );
        assert_eq!(query.params.len(), 2);
        assert_eq!(query.params["title_filter"], DatabaseValue::from("%solo%"));
    }

    #[test]
    fn test_null_handling_fragments() {
        let pred = || Some(SqlFragment::new("score >= :min").bind("min", 8));

        let f = SqlFragment::with_null_handling(pred(), "score", NullHandling::Ignore).unwrap();
        assert_eq!(f.sql(), "score >= :min");

        let f =
            SqlFragment::with_null_handling(pred(), "score", NullHandling::IncludeNull).unwrap();
        assert_eq!(f.sql(), "(score >= :min OR score IS NULL)");

        let f =
            SqlFragment::with_null_handling(pred(), "score", NullHandling::ExcludeNull).unwrap();
        assert_eq!(f.sql(), "(score >= :min AND score IS NOT NULL)");
        assert_eq!(f.params().len(), 1);

        assert!(SqlFragment::with_null_handling(None, "score", NullHandling::Ignore).is_none());
        assert!(
            SqlFragment::with_null_handling(None, "score", NullHandling::IncludeNull).is_none()
        );
        let f = SqlFragment::with_null_handling(None, "score", NullHandling::ExcludeNull).unwrap();
        assert_eq!(f.sql(), "score IS NOT NULL");
    }

    #[test]
    fn test_count_query_drops_order_and_paging() {
        let builder = SelectBuilder::new("games")
            .where_eq("status", "Playing")
            .order_by_asc("title")
            .limit(25)
            .offset(50);

        let count = builder.count_query();
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) AS count FROM (SELECT * FROM games WHERE status = :p0) AS counted"
        );
        assert_eq!(count.params.len(), 1);
    }

    #[test]
    fn test_insert() {
        let builder = InsertBuilder::new("books")
            .value("title", "Dune")
            .value("isbn", "9780441013593")
            .value("pages", 412);

        assert_eq!(
            builder.build(),
            "INSERT INTO books (title, isbn, pages) VALUES (:p0, :p1, :p2)"
        );
        assert_eq!(builder.params().len(), 3);
    }

    #[test]
    fn test_insert_returning_and_placeholder() {
        let builder = InsertBuilder::new("asian_media_titles")
            .value_placeholder("media_id", "media_id")
            .value("title", "Omniscient Reader")
            .returning(&["id"]);

        assert_eq!(
            builder.build(),
            "INSERT INTO asian_media_titles (media_id, title) VALUES (:media_id, :p0) RETURNING id"
        );
        assert!(builder.has_returning());
        assert_eq!(builder.params().len(), 1);
    }

    #[test]
    fn test_insert_on_conflict() {
        let upsert = InsertBuilder::new("authors")
            .value("name", "Frank Herbert")
            .on_conflict_do_update(&["name"], &["name"])
            .returning(&["id"]);
        assert_eq!(
            upsert.build(),
            "INSERT INTO authors (name) VALUES (:p0) ON CONFLICT (name) DO UPDATE SET name = excluded.name RETURNING id"
        );

        let ignore = InsertBuilder::new("tags")
            .value("name", "isekai")
            .on_conflict_do_nothing(&[]);
        assert_eq!(
            ignore.build(),
            "INSERT INTO tags (name) VALUES (:p0) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn test_update() {
        let builder = UpdateBuilder::new("games")
            .set("title", "Hades II")
            .set("status", "Playing")
            .where_eq("id", 1);

        assert_eq!(
            builder.build(),
            "UPDATE games SET title = :p0, status = :p1 WHERE id = :p2"
        );
        assert_eq!(builder.params().len(), 3);
    }

    #[test]
    fn test_delete_returning() {
        let builder = DeleteBuilder::new("tags")
            .where_eq("id", 42)
            .returning(&["name"]);

        assert_eq!(
            builder.build(),
            "DELETE FROM tags WHERE id = :p0 RETURNING name"
        );
        assert_eq!(builder.params().len(), 1);
    }

    #[test]
    fn test_select_join_with_column_infos() {
        let query = SelectBuilder::new("asian_media")
            .column_infos(&[
                ColumnInfo::new("asian_media", "id"),
                ColumnInfo::new("asian_media_titles", "title"),
            ])
            .join(
                "asian_media_titles",
                "asian_media_titles.media_id = asian_media.id",
            )
            .build();

        assert_eq!(
            query,
            "SELECT asian_media.id AS \"asian_media.id\", asian_media_titles.title AS \"asian_media_titles.title\" \
             FROM asian_media INNER JOIN asian_media_titles ON asian_media_titles.media_id = asian_media.id"
        );
    }

    #[test]
    fn test_select_where_null() {
        let query = SelectBuilder::new("asian_media")
            .where_null("source_url")
            .build();

        assert_eq!(query, "SELECT * FROM asian_media WHERE source_url IS NULL");
    }

    #[test]
    fn test_null_handling_serde() {
        let json = serde_json::to_string(&NullHandling::IncludeNull).unwrap();
        assert_eq!(json, "\"INCLUDE_NULL\"");
        let back: NullHandling = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NullHandling::IncludeNull);
    }
}
