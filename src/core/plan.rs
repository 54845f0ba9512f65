//! Multi-step transactions
//!
//! A [`TransactionPlan`] is an ordered list of statements whose parameters are
//! either literals or references to a column of a row returned (through
//! `RETURNING`) by an earlier step. [`TransactionPlanner`] runs a plan on one
//! pooled connection and commits only if every step succeeds.

use super::database::Executor;
use super::error::{DatabaseError, Result};
use super::query_builder::{BuiltQuery, DeleteBuilder, InsertBuilder, QueryParams, UpdateBuilder};
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue};
use crate::backends::{PooledSqliteDatabase, PooledTransaction};
use std::collections::BTreeMap;
use tracing::Instrument;

/// A step parameter
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// A value known when the plan is built
    Literal(DatabaseValue),
    /// A column of a row returned by an earlier step
    FromStep {
        /// Index of the referenced step
        step: usize,
        /// Column of the referenced row
        column: String,
        /// Row of the referenced step's result
        row: usize,
    },
}

impl StepValue {
    /// A literal parameter
    pub fn literal(value: impl Into<DatabaseValue>) -> Self {
        StepValue::Literal(value.into())
    }

    /// `column` of the first row returned by `step`
    pub fn from_step(step: usize, column: impl Into<String>) -> Self {
        StepValue::FromStep {
            step,
            column: column.into(),
            row: 0,
        }
    }

    /// `column` of row `row` returned by `step`
    pub fn from_step_row(step: usize, column: impl Into<String>, row: usize) -> Self {
        StepValue::FromStep {
            step,
            column: column.into(),
            row,
        }
    }
}

impl From<DatabaseValue> for StepValue {
    fn from(value: DatabaseValue) -> Self {
        StepValue::Literal(value)
    }
}

/// Kind of statement a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Insert,
    Update,
    Delete,
    Raw,
}

/// One statement of a plan
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStep {
    kind: StepKind,
    sql: String,
    bindings: BTreeMap<String, StepValue>,
    returns_rows: bool,
}

impl TransactionStep {
    /// A step running `sql`, whose `:name` placeholders are bound with [`bind`](Self::bind)
    pub fn new(kind: StepKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
            bindings: BTreeMap::new(),
            returns_rows: false,
        }
    }

    /// A raw SQL step
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(StepKind::Raw, sql)
    }

    fn from_query(kind: StepKind, query: BuiltQuery, returns_rows: bool) -> Self {
        Self {
            kind,
            sql: query.sql,
            bindings: literal_bindings(query.params),
            returns_rows,
        }
    }

    /// Bind a literal value to `:name`
    #[must_use]
    pub fn bind(self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.bind_value(name, StepValue::Literal(value.into()))
    }

    /// Bind `:name` to `column` of the first row returned by `step`
    #[must_use]
    pub fn bind_from(self, name: impl Into<String>, step: usize, column: impl Into<String>) -> Self {
        self.bind_value(name, StepValue::from_step(step, column))
    }

    /// Bind any step value to `:name`
    #[must_use]
    pub fn bind_value(mut self, name: impl Into<String>, value: StepValue) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Collect the rows the statement returns
    #[must_use]
    pub fn returning(mut self) -> Self {
        self.returns_rows = true;
        self
    }

    /// Kind of statement the step runs
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// SQL with `:name` placeholders
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the step's rows are recorded for later steps
    pub fn returns_rows(&self) -> bool {
        self.returns_rows
    }

    /// Indexes of the steps this step reads from
    pub fn references(&self) -> impl Iterator<Item = usize> + '_ {
        self.bindings.values().filter_map(|v| match v {
            StepValue::FromStep { step, .. } => Some(*step),
            StepValue::Literal(_) => None,
        })
    }
}

fn literal_bindings(params: QueryParams) -> BTreeMap<String, StepValue> {
    params
        .into_iter()
        .map(|(name, value)| (name, StepValue::Literal(value)))
        .collect()
}

impl From<InsertBuilder> for TransactionStep {
    fn from(builder: InsertBuilder) -> Self {
        let returns_rows = builder.has_returning();
        Self::from_query(StepKind::Insert, builder.to_query(), returns_rows)
    }
}

impl From<UpdateBuilder> for TransactionStep {
    fn from(builder: UpdateBuilder) -> Self {
        let returns_rows = builder.has_returning();
        Self::from_query(StepKind::Update, builder.to_query(), returns_rows)
    }
}

impl From<DeleteBuilder> for TransactionStep {
    fn from(builder: DeleteBuilder) -> Self {
        let returns_rows = builder.has_returning();
        Self::from_query(StepKind::Delete, builder.to_query(), returns_rows)
    }
}

/// Ordered steps executed atomically
///
/// Every reference points at a strictly earlier step; this is checked as
/// steps are added, so a built plan is always executable in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPlan {
    steps: Vec<TransactionStep>,
}

impl TransactionPlan {
    /// Empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, returning its index
    ///
    /// # Errors
    ///
    /// [`DatabaseError::InvalidStepReference`] when the step references its
    /// own index or a later one.
    pub fn push(&mut self, step: impl Into<TransactionStep>) -> Result<usize> {
        let step = step.into();
        let index = self.steps.len();

        if let Some(referenced) = step.references().find(|r| *r >= index) {
            return Err(DatabaseError::InvalidStepReference {
                step: index,
                referenced,
            });
        }

        self.steps.push(step);
        Ok(index)
    }

    /// Chainable [`push`](Self::push)
    pub fn with_step(mut self, step: impl Into<TransactionStep>) -> Result<Self> {
        self.push(step)?;
        Ok(self)
    }

    /// Build a plan from steps in order
    pub fn from_steps<I, S>(steps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<TransactionStep>,
    {
        let mut plan = Self::new();
        for step in steps {
            plan.push(step)?;
        }
        Ok(plan)
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Rows returned and rows affected by each executed step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResults {
    rows: Vec<DatabaseResult>,
    affected: Vec<u64>,
}

impl StepResults {
    /// Rows returned by `step` (empty for steps without RETURNING)
    pub fn rows(&self, step: usize) -> &[DatabaseRow] {
        self.rows.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `column` of the first row returned by `step`
    pub fn value(&self, step: usize, column: &str) -> Option<&DatabaseValue> {
        self.rows(step).first().and_then(|row| row.get(column))
    }

    /// Rows affected by `step`
    pub fn affected(&self, step: usize) -> u64 {
        self.affected.get(step).copied().unwrap_or(0)
    }

    /// Number of steps recorded
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no step has run
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn record(&mut self, rows: DatabaseResult, affected: u64) {
        self.rows.push(rows);
        self.affected.push(affected);
    }

    fn resolve(&self, step: usize, value: &StepValue) -> Result<DatabaseValue> {
        match value {
            StepValue::Literal(v) => Ok(v.clone()),
            StepValue::FromStep {
                step: referenced,
                column,
                row,
            } => self
                .rows(*referenced)
                .get(*row)
                .and_then(|r| r.get(column))
                .cloned()
                .ok_or_else(|| DatabaseError::UnresolvedReference {
                    step,
                    referenced: *referenced,
                    column: column.clone(),
                }),
        }
    }

    fn bind(&self, index: usize, step: &TransactionStep) -> Result<BuiltQuery> {
        let params = step
            .bindings
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.resolve(index, value)?)))
            .collect::<Result<QueryParams>>()?;

        Ok(BuiltQuery {
            sql: step.sql.clone(),
            params,
        })
    }
}

/// Runs plans atomically on the pooled database
#[derive(Debug, Clone)]
pub struct TransactionPlanner {
    db: PooledSqliteDatabase,
}

impl TransactionPlanner {
    /// Planner running on `db`
    pub fn new(db: PooledSqliteDatabase) -> Self {
        Self { db }
    }

    /// Execute every step in order on one connection and commit
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::UnresolvedReference`] when a referenced row or
    ///   column is not in the earlier step's result
    /// - [`DatabaseError::StepFailed`] wrapping the error of the failing step
    ///
    /// In both cases the transaction is rolled back and nothing is committed.
    pub async fn execute(&self, plan: &TransactionPlan) -> Result<StepResults> {
        let span = tracing::info_span!("transaction_plan", steps = plan.len());

        async {
            let tx = self.db.begin().await?;

            match Self::run_in(&tx, plan).await {
                Ok(results) => {
                    tx.commit().await?;
                    tracing::debug!("plan committed");
                    Ok(results)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "plan failed, rolling back");
                    if let Err(rollback_error) = tx.rollback().await {
                        tracing::error!(error = %rollback_error, "rollback failed");
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the steps inside an already open transaction without finishing it
    pub async fn run_in(tx: &PooledTransaction, plan: &TransactionPlan) -> Result<StepResults> {
        let mut results = StepResults::default();

        for (index, step) in plan.steps.iter().enumerate() {
            let query = results.bind(index, step)?;

            let outcome = if step.returns_rows {
                tx.fetch(&query)
                    .await
                    .map(|rows| (rows.len() as u64, rows))
            } else {
                tx.run(&query).await.map(|affected| (affected, Vec::new()))
            };

            let (affected, rows) = outcome.map_err(|e| DatabaseError::step_failed(index, e))?;
            tracing::debug!(step = index, kind = ?step.kind, affected, "step executed");
            results.record(rows, affected);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_self_and_forward_references() {
        let mut plan = TransactionPlan::new();
        plan.push(TransactionStep::raw("INSERT INTO a DEFAULT VALUES").returning())
            .unwrap();

        let err = plan
            .push(TransactionStep::raw("SELECT :x").bind_from("x", 1, "id"))
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidStepReference {
                step: 1,
                referenced: 1
            }
        ));

        let err = TransactionPlan::from_steps([
            TransactionStep::raw("SELECT 1"),
            TransactionStep::raw("SELECT :x").bind_from("x", 5, "id"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidStepReference {
                step: 1,
                referenced: 5
            }
        ));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_builder_conversion_keeps_placeholders() {
        let step: TransactionStep = InsertBuilder::new("asian_media_titles")
            .value_placeholder("media_id", "media_id")
            .value("title", "Tower of God")
            .into();
        let step = step.bind_from("media_id", 0, "id");

        assert_eq!(step.kind(), StepKind::Insert);
        assert!(!step.returns_rows());
        assert_eq!(step.references().collect::<Vec<_>>(), vec![0]);
        assert_eq!(
            step.sql(),
            "INSERT INTO asian_media_titles (media_id, title) VALUES (:media_id, :p0)"
        );
    }

    async fn setup() -> TransactionPlanner {
        let db = PooledSqliteDatabase::in_memory().await.unwrap();
        db.execute_batch(
            "CREATE TABLE series (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE games (id INTEGER PRIMARY KEY, series_id INTEGER REFERENCES series(id), title TEXT NOT NULL);",
        )
        .await
        .unwrap();
        TransactionPlanner::new(db)
    }

    #[tokio::test]
    async fn test_later_step_consumes_returned_id() {
        let planner = setup().await;
        let plan = TransactionPlan::from_steps([
            TransactionStep::from(
                InsertBuilder::new("series")
                    .value("name", "Zelda")
                    .returning(&["id"]),
            ),
            TransactionStep::from(
                InsertBuilder::new("games")
                    .value_placeholder("series_id", "series_id")
                    .value("title", "Tears of the Kingdom")
                    .returning(&["id", "series_id"]),
            )
            .bind_from("series_id", 0, "id"),
        ])
        .unwrap();

        let results = planner.execute(&plan).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.value(1, "series_id"), results.value(0, "id"));
        assert_eq!(results.affected(1), 1);
    }

    #[tokio::test]
    async fn test_failing_step_rolls_back_everything() {
        let planner = setup().await;
        let plan = TransactionPlan::from_steps([
            TransactionStep::from(InsertBuilder::new("series").value("name", "Metroid")),
            TransactionStep::from(InsertBuilder::new("series").value("name", "Metroid")),
        ])
        .unwrap();

        let err = planner.execute(&plan).await.unwrap_err();
        assert!(matches!(err, DatabaseError::StepFailed { step: 1, .. }));

        let rows = planner.db.query("SELECT * FROM series").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_reference() {
        let planner = setup().await;
        let plan = TransactionPlan::from_steps([
            TransactionStep::from(InsertBuilder::new("series").value("name", "Halo")),
            TransactionStep::raw("INSERT INTO games (series_id, title) VALUES (:sid, 'Halo 3')")
                .bind_from("sid", 0, "id"),
        ])
        .unwrap();

        let err = planner.execute(&plan).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::UnresolvedReference {
                step: 1,
                referenced: 0,
                ..
            }
        ));
        let rows = planner.db.query("SELECT * FROM series").await.unwrap();
        assert!(rows.is_empty());
    }
}
