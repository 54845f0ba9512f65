//! The media catalog: Asian media (novels, manga, manhwa, ...), games, books
//! and their lookup tables
//!
//! - [`model`]: stored enums and records
//! - [`schema`]: migrations and the type registry
//! - [`repository`]: reads and multi-step writes
//! - [`forms`], [`reports`]: form schemas and report definitions

pub mod forms;
pub mod model;
pub mod reports;
pub mod repository;
pub mod schema;

pub use forms::{asian_media_form, ExistingTitleValidator};
pub use model::{
    AsianMedia, AsianMediaTitle, Book, BookFormat, Game, GameStatus, Language, Named,
    NewAsianMedia, NewBook, NewGame, Progress, PublicationType, ReadingStatus, Series,
};
pub use reports::{all_reports, asian_media_report, books_report, games_report, AsianMediaListing};
pub use repository::{CatalogRepository, TitleMatch};
pub use schema::{migrate, migrations, type_registry};
