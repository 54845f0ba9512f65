//! Database backend implementations
//!
//! SQLite is the only backend; it is pooled through deadpool so async
//! callers never block on rusqlite directly.

pub mod pooled_sqlite;

pub use pooled_sqlite::{PoolConfig, PoolStats, PooledSqliteDatabase, PooledTransaction};
