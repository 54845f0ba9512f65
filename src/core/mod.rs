//! Core data-access layer
//!
//! Naming conventions and the type registry, the query builder, the result
//! mapper, the transaction planner, schema migrations, and the value and
//! error types they share.

pub mod database;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod naming;
pub mod plan;
pub mod query_builder;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use database::{Database, Executor};
pub use error::{DatabaseError, Result};
pub use mapping::{map_row, map_rows, FieldDescriptor, FieldType, FromRecord, Record, TypeDescriptor};
pub use migration::{Migration, MigrationManager, MigrationStatus};
pub use naming::NamingConvention;
pub use plan::{StepKind, StepResults, StepValue, TransactionPlan, TransactionPlanner, TransactionStep};
pub use query_builder::{
    BuiltQuery, ColumnInfo, DeleteBuilder, InsertBuilder, NullHandling, OrderDirection,
    QueryParams, SelectBuilder, SqlFragment, UpdateBuilder,
};
pub use registry::{DbEnum, EnumDescriptor, TypeRegistry};
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue};
