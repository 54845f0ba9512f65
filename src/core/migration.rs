//! Database migration system
//!
//! Provides tools for managing database schema versions with up/down migrations.
//! Each migration's SQL may hold several `;`-separated statements.
//!
//! # Example
//!
//! ```rust,no_run
//! use media_catalog::backends::PooledSqliteDatabase;
//! use media_catalog::core::{Migration, MigrationManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = PooledSqliteDatabase::new("catalog.db").await?;
//! let mut manager = MigrationManager::new(db);
//!
//! manager.add_migration(Migration::new(
//!     1,
//!     "create_tags",
//!     "CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)",
//!     "DROP TABLE tags",
//! ));
//! manager.add_migration(Migration::new(
//!     2,
//!     "add_tag_color",
//!     "ALTER TABLE tags ADD COLUMN color TEXT",
//!     "ALTER TABLE tags DROP COLUMN color",
//! ));
//!
//! manager.migrate().await?;
//! # Ok(())
//! # }
//! ```

use super::database::Database;
use super::error::{DatabaseError, Result};
use super::query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder};
use super::value::DatabaseValue;
use chrono::Utc;
use std::collections::BTreeMap;

/// Represents a single database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    version: i64,
    /// Human-readable name for this migration
    name: String,
    /// SQL to apply this migration (forward)
    up_sql: String,
    /// SQL to revert this migration (backward)
    down_sql: String,
}

impl Migration {
    /// Create a new migration
    ///
    /// # Arguments
    ///
    /// * `version` - Unique version number for this migration
    /// * `name` - Descriptive name for this migration
    /// * `up_sql` - SQL statements to apply the migration
    /// * `down_sql` - SQL statements to revert the migration
    pub fn new(
        version: i64,
        name: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Get the migration version
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Get the migration name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the up SQL
    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    /// Get the down SQL
    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }
}

/// Migration status for a specific version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration has been applied
    Applied,
    /// Migration is pending
    Pending,
}

/// Manages database migrations
pub struct MigrationManager<D: Database> {
    db: D,
    migrations: BTreeMap<i64, Migration>,
    table_name: String,
}

impl<D: Database> MigrationManager<D> {
    /// Default name for the migrations tracking table
    pub const DEFAULT_TABLE_NAME: &'static str = "schema_migrations";

    /// Create a new migration manager
    pub fn new(db: D) -> Self {
        Self::with_table_name(db, Self::DEFAULT_TABLE_NAME)
    }

    /// Create a migration manager with a custom tracking table name
    pub fn with_table_name(db: D, table_name: impl Into<String>) -> Self {
        Self {
            db,
            migrations: BTreeMap::new(),
            table_name: table_name.into(),
        }
    }

    /// Add a migration to the manager
    pub fn add_migration(&mut self, migration: Migration) {
        self.migrations.insert(migration.version, migration);
    }

    /// Add several migrations
    pub fn add_migrations(&mut self, migrations: impl IntoIterator<Item = Migration>) {
        for migration in migrations {
            self.add_migration(migration);
        }
    }

    /// Ensure the migrations tracking table exists
    async fn ensure_migrations_table(&self) -> Result<()> {
        let create_table_sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )",
            self.table_name
        );

        self.db.execute_batch(&create_table_sql).await
    }

    /// Get all applied migration versions
    async fn get_applied_versions(&self) -> Result<Vec<i64>> {
        self.ensure_migrations_table().await?;

        let versions = SelectBuilder::new(self.table_name.as_str())
            .columns(&["version"])
            .order_by_asc("version")
            .fetch_column(&self.db, "version")
            .await?;

        Ok(versions.iter().filter_map(DatabaseValue::as_long).collect())
    }

    /// Run the up SQL and record the version in one transaction
    async fn apply(&self, migration: &Migration) -> Result<()> {
        let record = InsertBuilder::new(self.table_name.as_str())
            .value("version", migration.version)
            .value("name", migration.name())
            .value("applied_at", Utc::now().timestamp())
            .to_query();

        self.db
            .execute_atomic(migration.up_sql(), &[record])
            .await
            .map_err(|e| {
                DatabaseError::migration(format!(
                    "Migration {} ({}) failed: {}",
                    migration.version, migration.name, e
                ))
            })?;

        tracing::info!(version = migration.version, name = %migration.name, "migration applied");
        Ok(())
    }

    /// Run the down SQL and forget the version in one transaction
    async fn revert(&self, version: i64) -> Result<()> {
        let migration = self.migrations.get(&version).ok_or_else(|| {
            DatabaseError::migration(format!("Migration {} not found", version))
        })?;

        let forget = DeleteBuilder::new(self.table_name.as_str())
            .where_eq("version", version)
            .to_query();

        self.db
            .execute_atomic(migration.down_sql(), &[forget])
            .await
            .map_err(|e| {
                DatabaseError::migration(format!(
                    "Reverting migration {} ({}) failed: {}",
                    version, migration.name, e
                ))
            })?;

        tracing::info!(version, name = %migration.name, "migration reverted");
        Ok(())
    }

    /// Check if a specific migration version has been applied
    pub async fn is_applied(&self, version: i64) -> Result<bool> {
        let applied = self.get_applied_versions().await?;
        Ok(applied.contains(&version))
    }

    /// Get the current schema version (highest applied migration)
    pub async fn current_version(&self) -> Result<Option<i64>> {
        let applied = self.get_applied_versions().await?;
        Ok(applied.last().copied())
    }

    /// Get the status of all migrations
    pub async fn migration_status(&self) -> Result<BTreeMap<i64, MigrationStatus>> {
        let applied = self.get_applied_versions().await?;

        Ok(self
            .migrations
            .keys()
            .map(|version| {
                let status = if applied.contains(version) {
                    MigrationStatus::Applied
                } else {
                    MigrationStatus::Pending
                };
                (*version, status)
            })
            .collect())
    }

    /// Apply all pending migrations
    pub async fn migrate(&self) -> Result<Vec<i64>> {
        self.migrate_up_to(i64::MAX).await
    }

    /// Migrate to a specific version
    ///
    /// If the target version is lower than current, migrations will be rolled back.
    /// If higher, pending migrations will be applied.
    pub async fn migrate_to(&self, target_version: i64) -> Result<Vec<i64>> {
        let current = self.current_version().await?.unwrap_or(0);

        if target_version > current {
            self.migrate_up_to(target_version).await
        } else if target_version < current {
            self.rollback_to(target_version).await
        } else {
            Ok(Vec::new())
        }
    }

    /// Apply pending migrations up to a specific version
    async fn migrate_up_to(&self, target_version: i64) -> Result<Vec<i64>> {
        let applied = self.get_applied_versions().await?;
        let mut migrated = Vec::new();

        for (version, migration) in self.migrations.range(..=target_version) {
            if applied.contains(version) {
                continue;
            }
            self.apply(migration).await?;
            migrated.push(*version);
        }

        Ok(migrated)
    }

    /// Rollback migrations to a specific version
    async fn rollback_to(&self, target_version: i64) -> Result<Vec<i64>> {
        let applied = self.get_applied_versions().await?;
        let mut rolled_back = Vec::new();

        for version in applied.iter().rev().take_while(|v| **v > target_version) {
            self.revert(*version).await?;
            rolled_back.push(*version);
        }

        Ok(rolled_back)
    }

    /// Rollback the last N migrations
    pub async fn rollback(&self, steps: usize) -> Result<Vec<i64>> {
        let applied = self.get_applied_versions().await?;
        let mut rolled_back = Vec::new();

        for version in applied.iter().rev().take(steps) {
            self.revert(*version).await?;
            rolled_back.push(*version);
        }

        Ok(rolled_back)
    }

    /// Get the list of pending migrations
    pub async fn pending_migrations(&self) -> Result<Vec<&Migration>> {
        let applied = self.get_applied_versions().await?;
        Ok(self
            .migrations
            .values()
            .filter(|m| !applied.contains(&m.version))
            .collect())
    }

    /// Reset the database by rolling back all migrations
    pub async fn reset(&self) -> Result<Vec<i64>> {
        let applied = self.get_applied_versions().await?;
        self.rollback(applied.len()).await
    }

    /// The managed database
    pub fn database(&self) -> &D {
        &self.db
    }
}
