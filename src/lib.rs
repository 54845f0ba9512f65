//! # Media Catalog
//!
//! A personal catalog of novels, manga and manhwa, games and books, stored in
//! SQLite, plus the small HTTP endpoint a browser extension uses to check
//! whether a page's title is already catalogued and to add it.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`core`] | naming conventions, type registry, query builder, result mapper, transaction planner, migrations |
//! | [`backends`] | pooled SQLite (deadpool + rusqlite) |
//! | [`form`] | headless form engine: schemas, control state, field and form validators |
//! | [`report`] | headless report engine: columns, filters, sorting, pagination, saved configurations |
//! | [`catalog`] | the catalog tables, their records, repository, forms and reports |
//! | [`server`], [`client`] | the extension API and its client |
//! | [`context`], [`config`], [`i18n`] | application context, configuration, translations |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use media_catalog::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = PooledSqliteDatabase::new("catalog.db").await?;
//!     media_catalog::catalog::migrate(db.clone()).await?;
//!
//!     let repository = CatalogRepository::new(db);
//!     let id = repository
//!         .add_asian_media(&NewAsianMedia {
//!             titles: vec!["Omniscient Reader's Viewpoint".into(), "ORV".into()],
//!             publication_type: PublicationType::WebNovel,
//!             language: Language::Korean,
//!             source_url: None,
//!         })
//!         .await?;
//!
//!     let found = repository.find_title(&["orv".into()]).await?;
//!     assert_eq!(found.map(|m| m.asian_media_id), Some(id));
//!     Ok(())
//! }
//! ```
//!
//! ### Multi-step writes
//!
//! Steps of a [`TransactionPlan`](core::TransactionPlan) run on one connection
//! inside one transaction; a step may bind a value returned by an earlier
//! step. Any failure rolls the whole plan back.
//!
//! ```rust,no_run
//! use media_catalog::prelude::*;
//!
//! # async fn run(db: PooledSqliteDatabase) -> Result<()> {
//! let mut plan = TransactionPlan::new();
//! plan.push(InsertBuilder::new("series").value("name", "Monogatari").returning(&["id"]))?;
//! plan.push(
//!     TransactionStep::from(
//!         InsertBuilder::new("games")
//!             .value("title", "Nisemonogatari")
//!             .value("status", GameStatus::Backlog.to_db())
//!             .value("created_at", 0i64)
//!             .value_placeholder("series_id", "series"),
//!     )
//!     .bind_from("series", 0, "id"),
//! )?;
//! TransactionPlanner::new(db).execute(&plan).await?;
//! # Ok(())
//! # }
//! ```

/// Core data-access types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

pub mod catalog;
pub mod client;
pub mod config;
pub mod context;
pub mod form;
pub mod i18n;
pub mod report;
pub mod server;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backends::{PoolConfig, PooledSqliteDatabase};
    pub use crate::catalog::{
        BookFormat, CatalogRepository, GameStatus, Language, NewAsianMedia, PublicationType,
        ReadingStatus,
    };
    pub use crate::core::{
        Database, DatabaseError, DatabaseResult, DatabaseRow, DatabaseValue, DbEnum, Executor,
        FromRecord, InsertBuilder, NullHandling, OrderDirection, Result, SelectBuilder,
        TransactionPlan, TransactionPlanner, TransactionStep,
    };
    pub use crate::form::{Form, FormSchema, FormValues};
    pub use crate::report::{FilterData, ReportView, SortConfiguration};
}

// Re-export at root level for convenience
pub use context::AppContext;
pub use core::{DatabaseError, DatabaseValue, Result};
