//! Pooled SQLite database backend implementation
//!
//! This module provides a connection-pooled SQLite implementation of the
//! [`Executor`] and [`Database`] traits using deadpool for connection
//! management. Every blocking rusqlite call runs on the pool's worker through
//! `interact`, bounded by the configured operation timeout.

use crate::core::{
    database::{Database, Executor},
    error::{DatabaseError, Result},
    query_builder::{BuiltQuery, QueryParams},
    value::{DatabaseResult, DatabaseRow, DatabaseValue},
};
use async_trait::async_trait;
use deadpool_sqlite::{Config, Object, Pool, PoolError, Runtime};
use rusqlite::{params_from_iter, Connection, Row, Statement};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default timeout for database operations (30 seconds)
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool configuration for SQLite connections
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Timeout for acquiring a connection from the pool
    pub timeout: Duration,
    /// Timeout for database operations (query, execute, etc.)
    pub operation_timeout: Duration,
    /// SQLite database path (or `:memory:`)
    pub connection_string: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            timeout: Duration::from_secs(5),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            connection_string: String::new(),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Set maximum pool size
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size.max(1);
        self
    }

    /// Set connection acquisition timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set database operation timeout (for query, execute, etc.)
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Run a closure on a pooled connection, bounded by `timeout`
async fn interact<T, F>(conn: &Object, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(timeout, conn.interact(f))
        .await
        .map_err(|_| DatabaseError::query_timeout(timeout.as_millis() as u64))?
        .map_err(|e| DatabaseError::other(format!("Interact error: {}", e)))?
}

/// Convert a rusqlite Row to a DatabaseRow
fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
    let mut db_row = DatabaseRow::new();
    let column_count = row.as_ref().column_count();

    for i in 0..column_count {
        let column_name = row.as_ref().column_name(i)?.to_string();
        let value = match row.get_ref(i)? {
            rusqlite::types::ValueRef::Null => DatabaseValue::Null,
            rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
            rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
            rusqlite::types::ValueRef::Text(v) => {
                DatabaseValue::String(String::from_utf8_lossy(v).to_string())
            }
            rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
        };
        db_row.insert(column_name, value);
    }

    Ok(db_row)
}

/// Convert DatabaseValue to rusqlite parameter
///
/// Composites have no SQLite type and are stored as JSON object text.
fn value_to_param(value: &DatabaseValue) -> Box<dyn rusqlite::ToSql> {
    match value {
        DatabaseValue::Null => Box::new(None::<i64>),
        DatabaseValue::Bool(v) => Box::new(*v),
        DatabaseValue::Int(v) => Box::new(*v),
        DatabaseValue::Long(v) => Box::new(*v),
        DatabaseValue::Float(v) => Box::new(*v),
        DatabaseValue::Double(v) => Box::new(*v),
        DatabaseValue::String(v) => Box::new(v.clone()),
        DatabaseValue::Bytes(v) => Box::new(v.clone()),
        DatabaseValue::Timestamp(v) => Box::new(*v),
        DatabaseValue::Composite(_) => Box::new(value.to_json().to_string()),
    }
}

/// Values for every parameter of `stmt`, in index order
///
/// Map entries the statement does not use are ignored; a placeholder with no
/// entry is an error rather than a silent NULL.
fn bind_params(stmt: &Statement<'_>, params: &QueryParams) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
    (1..=stmt.parameter_count())
        .map(|index| {
            let name = stmt.parameter_name(index).ok_or_else(|| {
                DatabaseError::query(format!(
                    "Positional parameter {} is not supported, use :name placeholders",
                    index
                ))
            })?;
            let key = name.trim_start_matches([':', '@', '$']);
            params
                .get(key)
                .map(value_to_param)
                .ok_or_else(|| DatabaseError::query(format!("No value bound for {}", name)))
        })
        .collect()
}

fn fetch_rows(conn: &mut Connection, query: &BuiltQuery) -> Result<DatabaseResult> {
    let mut stmt = conn.prepare(&query.sql)?;
    let bound = bind_params(&stmt, &query.params)?;
    let rows = stmt.query_map(params_from_iter(bound.iter()), row_to_database_row)?;

    let mut results = Vec::new();
    for row_result in rows {
        results.push(row_result?);
    }
    Ok(results)
}

fn run_statement(conn: &mut Connection, query: &BuiltQuery) -> Result<u64> {
    let mut stmt = conn.prepare(&query.sql)?;
    let bound = bind_params(&stmt, &query.params)?;
    let affected = stmt.execute(params_from_iter(bound.iter()))?;
    Ok(affected as u64)
}

/// Pooled SQLite database implementation
///
/// Cloning is cheap and shares the pool.
///
/// # Example
///
/// ```no_run
/// use media_catalog::backends::PooledSqliteDatabase;
/// use media_catalog::core::database::Executor;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = PooledSqliteDatabase::new("catalog.db").await?;
///     db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)").await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PooledSqliteDatabase {
    pool: Pool,
    acquire_timeout: Duration,
    operation_timeout: Duration,
}

impl std::fmt::Debug for PooledSqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSqliteDatabase")
            .field("stats", &self.stats())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl PooledSqliteDatabase {
    /// Create a new pooled SQLite database instance with default configuration
    ///
    /// # Errors
    ///
    /// Returns error if pool creation or initialization fails
    pub async fn new(connection_string: impl Into<String>) -> Result<Self> {
        Self::with_config(PoolConfig::new(connection_string)).await
    }

    /// A private in-memory database
    ///
    /// Every SQLite connection to `:memory:` opens its own database, so the
    /// pool is limited to one connection. Failed and dropped transactions are
    /// rolled back on that connection rather than discarding it, so the
    /// database lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        Self::with_config(PoolConfig::new(":memory:").with_max_size(1)).await
    }

    /// Create a new pooled SQLite database instance with custom configuration
    ///
    /// # Errors
    ///
    /// Returns error if pool creation or initialization fails
    pub async fn with_config(config: PoolConfig) -> Result<Self> {
        let mut pool_config = Config::new(&config.connection_string);
        let mut limits = deadpool_sqlite::PoolConfig::new(config.max_size);
        limits.timeouts.wait = Some(config.timeout);
        pool_config.pool = Some(limits);

        let pool = pool_config
            .create_pool(Runtime::Tokio1)
            .map_err(|e| DatabaseError::connection(format!("Failed to create pool: {}", e)))?;

        let db = Self {
            pool,
            acquire_timeout: config.timeout,
            operation_timeout: config.operation_timeout,
        };

        let conn = db.acquire().await?;
        interact(&conn, db.operation_timeout, |conn| {
            // PRAGMA journal_mode returns a value, so we need to use query_row
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::connection(format!("Failed to initialize database: {}", e)))?;

        tracing::info!(
            path = %config.connection_string,
            max_size = config.max_size,
            "SQLite pool ready"
        );

        Ok(db)
    }

    /// Get a connection with foreign keys enforced
    async fn acquire(&self) -> Result<Object> {
        let conn = self.pool.get().await.map_err(|e| match e {
            PoolError::Timeout(_) => {
                DatabaseError::connection_timeout(self.acquire_timeout.as_millis() as u64)
            }
            other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
        })?;

        // Per connection, and a no-op inside a transaction, so set it before BEGIN
        let busy_timeout = self.operation_timeout;
        interact(&conn, self.operation_timeout, move |conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
            conn.busy_timeout(busy_timeout)?;
            Ok(())
        })
        .await?;

        Ok(conn)
    }

    /// Begin a transaction on a dedicated connection
    pub async fn begin(&self) -> Result<PooledTransaction> {
        PooledTransaction::begin(self).await
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }
}

fn run_atomic(conn: &mut Connection, batch: &str, statements: &[BuiltQuery]) -> Result<()> {
    conn.execute_batch(batch)?;
    for statement in statements {
        run_statement(conn, statement)?;
    }
    Ok(())
}

/// Hand a connection back to the pool once no transaction is open on it
///
/// An open transaction is rolled back first. A connection that still cannot
/// be brought back to autocommit is detached from the pool, which closes it.
async fn release(conn: Object, timeout: Duration) {
    let idle = interact(&conn, timeout, |conn| {
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(conn.is_autocommit())
    })
    .await;

    match idle {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            tracing::warn!("connection left in an open transaction, discarding it");
            let _ = Object::take(conn);
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total number of connections in the pool
    pub size: usize,
    /// Number of available connections
    pub available: usize,
    /// Number of requests waiting for a connection
    pub waiting: usize,
}

#[async_trait]
impl Executor for PooledSqliteDatabase {
    async fn fetch(&self, query: &BuiltQuery) -> Result<DatabaseResult> {
        tracing::trace!(sql = %query.sql, params = query.params.len(), "fetch");
        let conn = self.acquire().await?;
        let query = query.clone();
        interact(&conn, self.operation_timeout, move |conn| fetch_rows(conn, &query)).await
    }

    async fn run(&self, query: &BuiltQuery) -> Result<u64> {
        tracing::trace!(sql = %query.sql, params = query.params.len(), "run");
        let conn = self.acquire().await?;
        let query = query.clone();
        interact(&conn, self.operation_timeout, move |conn| run_statement(conn, &query)).await
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.acquire().await?;
        let sql = sql.to_string();
        interact(&conn, self.operation_timeout, move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Database for PooledSqliteDatabase {
    async fn ping(&self) -> Result<()> {
        let conn = self.acquire().await.map_err(|e| {
            DatabaseError::connection(format!("Pool health check failed: {}", e))
        })?;
        interact(&conn, self.operation_timeout, |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn execute_atomic(&self, batch: &str, statements: &[BuiltQuery]) -> Result<()> {
        let conn = self.acquire().await?;
        let batch = batch.to_string();
        let statements = statements.to_vec();
        let result = interact(&conn, self.operation_timeout, move |conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            match run_atomic(conn, &batch, &statements) {
                Ok(()) => {
                    conn.execute_batch("COMMIT")?;
                    Ok(())
                }
                Err(e) => {
                    if !conn.is_autocommit() {
                        let _ = conn.execute_batch("ROLLBACK");
                    }
                    Err(e)
                }
            }
        })
        .await;

        if result.is_err() {
            release(conn, self.operation_timeout).await;
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.pool.status().size > 0
    }
}

/// Transaction guard for pooled connections
///
/// The transaction uses the same connection throughout its lifecycle, so
/// every statement run through it sees the uncommitted work of the earlier
/// ones.
///
/// # Example
///
/// ```no_run
/// use media_catalog::backends::{PooledSqliteDatabase, PooledTransaction};
/// use media_catalog::core::database::Executor;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = PooledSqliteDatabase::new("catalog.db").await?;
///
/// let tx = PooledTransaction::begin(&db).await?;
/// tx.execute("INSERT INTO tags (name) VALUES ('isekai')").await?;
/// tx.execute("INSERT INTO tags (name) VALUES ('murim')").await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
///
/// # Dropping without commit
///
/// A transaction dropped while still open is rolled back in the background
/// and its connection returns to the pool, so the single connection of
/// [`PooledSqliteDatabase::in_memory`] keeps its database.
pub struct PooledTransaction {
    connection: Option<Object>,
    committed: AtomicBool,
    rolled_back: AtomicBool,
    operation_timeout: Duration,
}

impl PooledTransaction {
    /// Begin a new transaction
    ///
    /// Acquires a connection from the pool and takes the write lock on it
    /// (`BEGIN IMMEDIATE`), so concurrent writers queue instead of failing
    /// midway.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Pool cannot provide a connection
    /// - BEGIN fails
    pub async fn begin(db: &PooledSqliteDatabase) -> Result<Self> {
        let conn = db.acquire().await?;
        let operation_timeout = db.operation_timeout;

        interact(&conn, operation_timeout, |conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            Ok(())
        })
        .await?;

        tracing::debug!("transaction started");

        Ok(Self {
            connection: Some(conn),
            committed: AtomicBool::new(false),
            rolled_back: AtomicBool::new(false),
            operation_timeout,
        })
    }

    fn connection(&self) -> Result<&Object> {
        self.connection
            .as_ref()
            .ok_or_else(|| DatabaseError::transaction("Transaction already finalized"))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.committed.load(Ordering::Acquire) {
            return Err(DatabaseError::transaction("Transaction already committed"));
        }
        if self.rolled_back.load(Ordering::Acquire) {
            return Err(DatabaseError::transaction("Transaction already rolled back"));
        }
        Ok(())
    }

    async fn finish(&mut self, statement: &'static str) -> Result<()> {
        self.ensure_open()?;
        let conn = self
            .connection
            .take()
            .ok_or_else(|| DatabaseError::transaction("Transaction connection missing"))?;

        let result = interact(&conn, self.operation_timeout, move |conn| {
            conn.execute_batch(statement)?;
            Ok(())
        })
        .await;

        if result.is_err() {
            release(conn, self.operation_timeout).await;
        }
        result
    }

    /// Commit the transaction
    ///
    /// Commits the transaction and returns the connection to the pool.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Transaction already committed or rolled back
    /// - COMMIT statement fails
    pub async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await?;
        self.committed.store(true, Ordering::Release);
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Rollback the transaction
    ///
    /// Rolls back the transaction and returns the connection to the pool.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Transaction already committed or rolled back
    /// - ROLLBACK statement fails
    pub async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await?;
        self.rolled_back.store(true, Ordering::Release);
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl Executor for PooledTransaction {
    async fn fetch(&self, query: &BuiltQuery) -> Result<DatabaseResult> {
        tracing::trace!(sql = %query.sql, "fetch in transaction");
        let query = query.clone();
        interact(self.connection()?, self.operation_timeout, move |conn| {
            fetch_rows(conn, &query)
        })
        .await
    }

    async fn run(&self, query: &BuiltQuery) -> Result<u64> {
        tracing::trace!(sql = %query.sql, "run in transaction");
        let query = query.clone();
        interact(self.connection()?, self.operation_timeout, move |conn| {
            run_statement(conn, &query)
        })
        .await
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        interact(self.connection()?, self.operation_timeout, move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }
}

impl Drop for PooledTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::warn!("PooledTransaction dropped without commit or rollback; rolling back");
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(release(conn, self.operation_timeout));
                }
                // Without a runtime, closing the connection makes SQLite roll back
                Err(_) => {
                    let _ = Object::take(conn);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn file_db(dir: &tempfile::TempDir) -> PooledSqliteDatabase {
        let path = dir.path().join("pool.db");
        PooledSqliteDatabase::with_config(
            PoolConfig::new(path.to_string_lossy()).with_max_size(4),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_pooled_sqlite_connect() {
        let db = PooledSqliteDatabase::in_memory().await;
        assert!(db.is_ok());

        let db = db.unwrap();
        assert!(db.is_connected());
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_pooled_sqlite_execute() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;

        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)")
            .await?;

        let affected = db
            .run(&BuiltQuery::new("INSERT INTO tags (name) VALUES (:name)").bind("name", "isekai"))
            .await?;
        assert_eq!(affected, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_named_params_ignore_unused_entries() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)")
            .await?;
        db.execute("INSERT INTO tags (name) VALUES ('isekai'), ('murim')")
            .await?;

        let rows = db
            .fetch(
                &BuiltQuery::new("SELECT name FROM tags WHERE name = :name")
                    .bind("name", "murim")
                    .bind("unused", 1),
            )
            .await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DatabaseValue::from("murim"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unbound_placeholder_is_an_error() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        let err = db
            .fetch(&BuiltQuery::new("SELECT :missing AS value"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_composite_is_stored_as_json() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        db.execute("CREATE TABLE t (progress TEXT)").await?;

        let mut progress = DatabaseRow::new();
        progress.insert("chapter".to_string(), DatabaseValue::Long(12));
        db.run(
            &BuiltQuery::new("INSERT INTO t (progress) VALUES (:p)")
                .bind("p", DatabaseValue::Composite(progress)),
        )
        .await?;

        let rows = db
            .query("SELECT json_extract(progress, '$.chapter') AS chapter FROM t")
            .await?;
        assert_eq!(rows[0]["chapter"], DatabaseValue::Long(12));
        Ok(())
    }

    #[tokio::test]
    async fn test_pooled_concurrent_inserts() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(file_db(&dir).await);

        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)")
            .await?;

        let mut handles = vec![];
        for i in 0..10 {
            let db_clone = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                db_clone
                    .run(
                        &BuiltQuery::new("INSERT INTO tags (name) VALUES (:name)")
                            .bind("name", format!("tag{}", i)),
                    )
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap()?;
        }

        let results = db.query("SELECT COUNT(*) AS count FROM tags").await?;
        assert_eq!(results[0]["count"], DatabaseValue::Long(10));

        Ok(())
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)")
            .await?;

        let tx = db.begin().await?;
        tx.execute("INSERT INTO tags (name) VALUES ('kept')").await?;
        tx.commit().await?;

        let tx = db.begin().await?;
        tx.execute("INSERT INTO tags (name) VALUES ('discarded')")
            .await?;
        let inside = tx.query("SELECT * FROM tags").await?;
        assert_eq!(inside.len(), 2);
        tx.rollback().await?;

        let rows = db.query("SELECT name FROM tags").await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DatabaseValue::from("kept"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_transaction_does_not_commit() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)")
            .await?;

        {
            let tx = db.begin().await?;
            tx.execute("INSERT INTO tags (name) VALUES ('lost')").await?;
        }

        let rows = db.query("SELECT * FROM tags").await?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_in_memory_survives_dropped_transaction() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        db.execute_batch(
            "CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO tags (name) VALUES ('kept');",
        )
        .await?;

        {
            let tx = db.begin().await?;
            tx.execute("INSERT INTO tags (name) VALUES ('lost')").await?;
        }

        let rows = db.query("SELECT name FROM tags").await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DatabaseValue::from("kept"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_and_keeps_connection() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        db.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
             );",
        )
        .await?;

        let tx = db.begin().await?;
        tx.execute("INSERT INTO child (parent_id) VALUES (99)").await?;
        assert!(tx.commit().await.is_err());

        let rows = db.query("SELECT COUNT(*) AS n FROM child").await?;
        assert_eq!(rows[0]["n"], DatabaseValue::Long(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_execute_atomic_commits_all_or_nothing() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")
            .await?;

        let insert = |name: &str| {
            BuiltQuery::new("INSERT INTO tags (name) VALUES (:name)").bind("name", name)
        };
        db.execute_atomic("INSERT INTO tags (name) VALUES ('a')", &[insert("b")])
            .await?;

        let result = db
            .execute_atomic("INSERT INTO tags (name) VALUES ('c')", &[insert("a")])
            .await;
        assert!(result.is_err());

        let rows = db.query("SELECT name FROM tags ORDER BY name").await?;
        let names: Vec<String> = rows.iter().map(|r| r["name"].as_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;
        db.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER NOT NULL REFERENCES parent(id));",
        )
        .await?;

        let result = db
            .execute("INSERT INTO child (parent_id) VALUES (99)")
            .await;
        assert!(matches!(result, Err(DatabaseError::SqliteError(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_pool_stats() -> Result<()> {
        let db = PooledSqliteDatabase::in_memory().await?;

        let stats = db.stats();
        assert!(stats.size > 0);

        Ok(())
    }
}
