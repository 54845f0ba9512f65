//! Database traits
//!
//! [`Executor`] is the seam every query builder, the result mapper and the
//! transaction planner run against: it takes a [`BuiltQuery`] (SQL with named
//! placeholders plus its parameter map). [`Database`] adds the pool-level
//! operations of a whole database handle.

use super::error::Result;
use super::query_builder::BuiltQuery;
use super::value::DatabaseResult;
use async_trait::async_trait;

/// Something that can run named-parameter queries
///
/// Implemented by the pooled database (one pooled connection per call) and by
/// a pooled transaction (its one held connection).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a query and collect its rows (SELECT, or any statement with RETURNING)
    async fn fetch(&self, query: &BuiltQuery) -> Result<DatabaseResult>;

    /// Run a statement, returning the number of affected rows
    async fn run(&self, query: &BuiltQuery) -> Result<u64>;

    /// Run several `;`-separated statements without parameters
    ///
    /// # Security Warning
    ///
    /// **SQL Injection Risk**: the text is executed as-is. Only use it with
    /// SQL written in code (schema DDL, pragmas).
    async fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a SELECT without parameters
    async fn query(&self, sql: &str) -> Result<DatabaseResult> {
        self.fetch(&BuiltQuery::new(sql)).await
    }

    /// Run a statement without parameters
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.run(&BuiltQuery::new(sql)).await
    }
}

/// A whole database handle
#[async_trait]
pub trait Database: Executor {
    /// Check that a connection can be acquired and used
    async fn ping(&self) -> Result<()>;

    /// Run a `;`-separated batch followed by `statements` in one transaction
    ///
    /// Either everything is committed or nothing is. Like
    /// [`Executor::execute_batch`], the batch text is executed as-is.
    async fn execute_atomic(&self, batch: &str, statements: &[BuiltQuery]) -> Result<()>;

    /// Whether the handle currently holds live connections
    fn is_connected(&self) -> bool;
}
