//! Catalog schema migrations

use super::model::{AsianMedia, Book, Game, Named, Series};
use super::model::{AsianMediaTitle, BookFormat, GameStatus, Language, PublicationType, ReadingStatus};
use crate::core::database::Database;
use crate::core::error::Result;
use crate::core::migration::{Migration, MigrationManager};
use crate::core::registry::TypeRegistry;
use crate::report::CREATE_REPORT_CONFIGURATIONS;

/// Registry of every enum and record the catalog stores
pub fn type_registry() -> Result<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry
        .register_enum::<PublicationType>()?
        .register_enum::<Language>()?
        .register_enum::<ReadingStatus>()?
        .register_enum::<GameStatus>()?
        .register_enum::<BookFormat>()?
        .register_record::<AsianMedia>()?
        .register_record::<AsianMediaTitle>()?
        .register_record::<Series>()?
        .register_record::<Game>()?
        .register_record::<Book>()?
        .register_record::<Named>()?;
    Ok(registry)
}

/// Versioned migrations creating the catalog schema
pub fn migrations(registry: &TypeRegistry) -> Result<Vec<Migration>> {
    let publication_type = registry.check_constraint("publication_type", "publication_type")?;
    let language = registry.check_constraint("language", "language")?;
    let reading_status = registry.check_constraint("reading_status", "reading_status")?;
    let game_status = registry.check_constraint("status", "game_status")?;
    let book_format = registry.check_constraint("format", "book_format")?;
    let default_reading = registry.encode_enum("reading_status", "PlanToRead")?;
    let default_game = registry.encode_enum("game_status", "Backlog")?;

    Ok(vec![
        Migration::new(
            1,
            "create_lookup_tables",
            "CREATE TABLE series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                publisher TEXT
            );
            CREATE TABLE authors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );",
            "DROP TABLE tags; DROP TABLE categories; DROP TABLE authors; DROP TABLE series;",
        ),
        Migration::new(
            2,
            "create_asian_media",
            format!(
                "CREATE TABLE asian_media (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    publication_type TEXT NOT NULL {publication_type},
                    language TEXT NOT NULL {language},
                    reading_status TEXT NOT NULL DEFAULT '{default_reading}' {reading_status},
                    source_url TEXT,
                    series_id INTEGER REFERENCES series(id) ON DELETE SET NULL,
                    progress TEXT,
                    rating REAL CHECK (rating IS NULL OR rating BETWEEN 0 AND 10),
                    notes TEXT,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE asian_media_titles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    asian_media_id INTEGER NOT NULL REFERENCES asian_media(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    normalized_title TEXT NOT NULL UNIQUE,
                    position INTEGER NOT NULL,
                    UNIQUE (asian_media_id, position)
                );
                CREATE TABLE asian_media_tags (
                    asian_media_id INTEGER NOT NULL REFERENCES asian_media(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (asian_media_id, tag_id)
                );"
            ),
            "DROP TABLE asian_media_tags; DROP TABLE asian_media_titles; DROP TABLE asian_media;",
        ),
        Migration::new(
            3,
            "create_games",
            format!(
                "CREATE TABLE games (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    platform TEXT,
                    status TEXT NOT NULL DEFAULT '{default_game}' {game_status},
                    rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 1 AND 10),
                    hours_played REAL,
                    release_year INTEGER,
                    series_id INTEGER REFERENCES series(id) ON DELETE SET NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE game_categories (
                    game_id INTEGER NOT NULL REFERENCES games(id) ON DELETE CASCADE,
                    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                    PRIMARY KEY (game_id, category_id)
                );"
            ),
            "DROP TABLE game_categories; DROP TABLE games;",
        ),
        Migration::new(
            4,
            "create_books",
            format!(
                "CREATE TABLE books (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    isbn TEXT UNIQUE,
                    format TEXT NOT NULL {book_format},
                    reading_status TEXT NOT NULL DEFAULT '{default_reading}' {reading_status},
                    pages INTEGER CHECK (pages IS NULL OR pages > 0),
                    series_id INTEGER REFERENCES series(id) ON DELETE SET NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE TABLE book_authors (
                    book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES authors(id),
                    position INTEGER NOT NULL,
                    PRIMARY KEY (book_id, author_id)
                );"
            ),
            "DROP TABLE book_authors; DROP TABLE books;",
        ),
        Migration::new(
            5,
            "create_report_configurations",
            CREATE_REPORT_CONFIGURATIONS,
            "DROP TABLE report_configurations",
        ),
    ])
}

/// Bring the catalog schema up to date, returning the versions applied
pub async fn migrate<D: Database>(db: D) -> Result<Vec<i64>> {
    let registry = type_registry()?;
    let mut manager = MigrationManager::new(db);
    manager.add_migrations(migrations(&registry)?);
    let applied = manager.migrate().await?;
    if !applied.is_empty() {
        tracing::info!(versions = ?applied, "Catalog schema migrated");
    }
    Ok(applied)
}
