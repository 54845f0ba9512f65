//! Catalog reads and writes
//!
//! Multi-row inserts (an entry and its titles, a book and its authors) are
//! built as [`TransactionPlan`]s: the parent row is inserted with
//! `RETURNING id` and the child rows bind that id from the step result, so
//! either everything is stored or nothing is.

use super::model::{
    AsianMedia, AsianMediaTitle, Book, Game, GameStatus, Named, NewAsianMedia, NewBook, NewGame,
    Progress, ReadingStatus, Series,
};
use crate::backends::PooledSqliteDatabase;
use crate::core::error::{DatabaseError, Result};
use crate::core::plan::{TransactionPlan, TransactionPlanner, TransactionStep};
use crate::core::query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
use crate::core::value::DatabaseValue;
use crate::form::normalize_title;
use chrono::Utc;
use serde::Serialize;

/// A stored title matching one of the searched titles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleMatch {
    pub asian_media_id: i64,
    /// The title as stored
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: PooledSqliteDatabase,
    planner: TransactionPlanner,
}

impl CatalogRepository {
    /// Repository over the pooled catalog database
    pub fn new(db: PooledSqliteDatabase) -> Self {
        Self {
            planner: TransactionPlanner::new(db.clone()),
            db,
        }
    }

    /// The underlying database
    pub fn database(&self) -> &PooledSqliteDatabase {
        &self.db
    }

    /// First stored title equal to one of `titles`, ignoring case and
    /// surrounding whitespace
    pub async fn find_title(&self, titles: &[String]) -> Result<Option<TitleMatch>> {
        let normalized: Vec<String> = titles
            .iter()
            .map(|t| normalize_title(t))
            .filter(|t| !t.is_empty())
            .collect();
        if normalized.is_empty() {
            return Ok(None);
        }

        let row = SelectBuilder::new("asian_media_titles")
            .columns(&["asian_media_id", "title"])
            .where_in("normalized_title", normalized)
            .order_by_asc("position")
            .order_by_asc("id")
            .limit(1)
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| {
            Ok(TitleMatch {
                asian_media_id: long_column(&row, "asian_media_id")?,
                title: row
                    .get("title")
                    .map(DatabaseValue::as_string)
                    .ok_or_else(|| DatabaseError::ColumnNotFound("title".into()))?,
            })
        })
        .transpose()
    }

    /// Every stored title among `titles`
    pub async fn existing_titles(&self, titles: &[String]) -> Result<Vec<String>> {
        let normalized: Vec<String> = titles.iter().map(|t| normalize_title(t)).collect();
        let found = SelectBuilder::new("asian_media_titles")
            .columns(&["normalized_title"])
            .where_in("normalized_title", normalized)
            .fetch_column(&self.db, "normalized_title")
            .await?;
        let found: Vec<String> = found.iter().map(DatabaseValue::as_string).collect();

        Ok(titles
            .iter()
            .filter(|t| found.contains(&normalize_title(t)))
            .cloned()
            .collect())
    }

    /// Store an entry with all its titles, returning the new id
    pub async fn add_asian_media(&self, media: &NewAsianMedia) -> Result<i64> {
        let mut plan = TransactionPlan::new();
        let mut insert = InsertBuilder::new("asian_media")
            .value("publication_type", media.publication_type)
            .value("language", media.language)
            .value("reading_status", ReadingStatus::PlanToRead)
            .value("created_at", Utc::now())
            .returning(&["id"]);
        if let Some(url) = media.source_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            insert = insert.value("source_url", url);
        }
        let parent = plan.push(insert)?;

        for (position, title) in media.titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).enumerate() {
            plan.push(
                TransactionStep::from(
                    InsertBuilder::new("asian_media_titles")
                        .value_placeholder("asian_media_id", "media_id")
                        .value("title", title)
                        .value("normalized_title", normalize_title(title))
                        .value("position", position as i64),
                )
                .bind_from("media_id", parent, "id"),
            )?;
        }

        let results = self.planner.execute(&plan).await?;
        let id = step_id(&results, parent)?;
        tracing::info!(id, titles = plan.len() - 1, "Added asian media");
        Ok(id)
    }

    /// One asian media entry by id
    pub async fn get_asian_media(&self, id: i64) -> Result<Option<AsianMedia>> {
        let media: Option<AsianMedia> = SelectBuilder::new("asian_media")
            .where_eq("id", id)
            .fetch_one_mapped(&self.db)
            .await?;
        match media {
            Some(mut media) => {
                media.titles = self.titles_of(id).await?;
                Ok(Some(media))
            }
            None => Ok(None),
        }
    }

    /// Titles of an entry, primary first
    pub async fn titles_of(&self, asian_media_id: i64) -> Result<Vec<AsianMediaTitle>> {
        SelectBuilder::new("asian_media_titles")
            .columns(&["id", "asian_media_id", "title", "position"])
            .where_eq("asian_media_id", asian_media_id)
            .order_by_asc("position")
            .fetch_mapped(&self.db)
            .await
    }

    /// Record reading progress; false when the entry does not exist
    pub async fn update_progress(
        &self,
        id: i64,
        status: ReadingStatus,
        progress: Option<&Progress>,
    ) -> Result<bool> {
        let progress = progress.map_or(DatabaseValue::Null, Progress::to_value);
        let updated = UpdateBuilder::new("asian_media")
            .set("reading_status", status)
            .set("progress", progress)
            .where_eq("id", id)
            .execute(&self.db)
            .await?;
        Ok(updated > 0)
    }

    /// Set or clear the rating; `false` when the id is unknown
    pub async fn rate_asian_media(&self, id: i64, rating: Option<f64>) -> Result<bool> {
        let updated = UpdateBuilder::new("asian_media")
            .set("rating", rating)
            .where_eq("id", id)
            .execute(&self.db)
            .await?;
        Ok(updated > 0)
    }

    /// Delete an entry; its titles and tag links go with it
    pub async fn delete_asian_media(&self, id: i64) -> Result<bool> {
        let deleted = DeleteBuilder::new("asian_media")
            .where_eq("id", id)
            .execute(&self.db)
            .await?;
        Ok(deleted > 0)
    }

    /// Attach tags to an entry, creating missing tags
    pub async fn tag_asian_media(&self, asian_media_id: i64, tags: &[&str]) -> Result<()> {
        let mut plan = TransactionPlan::new();
        for tag in tags {
            let tag_step = plan.push(upsert_named("tags", tag))?;
            plan.push(
                TransactionStep::from(
                    InsertBuilder::new("asian_media_tags")
                        .value("asian_media_id", asian_media_id)
                        .value_placeholder("tag_id", "tag_id")
                        .on_conflict_do_nothing(&["asian_media_id", "tag_id"]),
                )
                .bind_from("tag_id", tag_step, "id"),
            )?;
        }
        self.planner.execute(&plan).await?;
        Ok(())
    }

    /// Tags of an asian media entry, by name
    pub async fn tags_of(&self, asian_media_id: i64) -> Result<Vec<Named>> {
        SelectBuilder::new("tags")
            .columns(&["tags.id AS id", "tags.name AS name"])
            .join("asian_media_tags", "asian_media_tags.tag_id = tags.id")
            .where_eq("asian_media_tags.asian_media_id", asian_media_id)
            .order_by_asc("tags.name")
            .fetch_mapped(&self.db)
            .await
    }

    /// Create a series, or return the id of the one with the same name
    pub async fn add_series(&self, name: &str, publisher: Option<&str>) -> Result<i64> {
        let rows = InsertBuilder::new("series")
            .value("name", name.trim())
            .value("publisher", publisher)
            .on_conflict_do_update(&["name"], &["name"])
            .returning(&["id"])
            .fetch_returning(&self.db)
            .await?;
        rows.first()
            .map(|row| long_column(row, "id"))
            .transpose()?
            .ok_or_else(|| DatabaseError::query("series insert returned no id"))
    }

    /// Every series, by name
    pub async fn series(&self) -> Result<Vec<Series>> {
        SelectBuilder::new("series")
            .order_by_asc("name")
            .fetch_mapped(&self.db)
            .await
    }

    /// Store a game with its categories, returning the new id
    pub async fn add_game(&self, game: &NewGame) -> Result<i64> {
        let mut plan = TransactionPlan::new();
        let parent = plan.push(
            InsertBuilder::new("games")
                .value("title", game.title.trim())
                .value("platform", game.platform.clone())
                .value("status", game.status.unwrap_or(GameStatus::Backlog))
                .value("rating", game.rating)
                .value("hours_played", game.hours_played)
                .value("release_year", game.release_year)
                .value("series_id", game.series_id)
                .value("created_at", Utc::now())
                .returning(&["id"]),
        )?;

        for category in &game.categories {
            let category_step = plan.push(upsert_named("categories", category))?;
            plan.push(
                TransactionStep::from(
                    InsertBuilder::new("game_categories")
                        .value_placeholder("game_id", "game_id")
                        .value_placeholder("category_id", "category_id")
                        .on_conflict_do_nothing(&["game_id", "category_id"]),
                )
                .bind_from("game_id", parent, "id")
                .bind_from("category_id", category_step, "id"),
            )?;
        }

        let results = self.planner.execute(&plan).await?;
        step_id(&results, parent)
    }

    /// One game by id
    pub async fn get_game(&self, id: i64) -> Result<Option<Game>> {
        SelectBuilder::new("games")
            .where_eq("id", id)
            .fetch_one_mapped(&self.db)
            .await
    }

    /// Games in the given status, by title
    pub async fn games_with_status(&self, status: GameStatus) -> Result<Vec<Game>> {
        SelectBuilder::new("games")
            .where_eq("status", status)
            .order_by_asc("title")
            .fetch_mapped(&self.db)
            .await
    }

    /// Move a game to another status; `false` when the id is unknown
    pub async fn set_game_status(&self, id: i64, status: GameStatus) -> Result<bool> {
        let updated = UpdateBuilder::new("games")
            .set("status", status)
            .where_eq("id", id)
            .execute(&self.db)
            .await?;
        Ok(updated > 0)
    }

    /// Categories of a game, by name
    pub async fn categories_of_game(&self, game_id: i64) -> Result<Vec<Named>> {
        SelectBuilder::new("categories")
            .columns(&["categories.id AS id", "categories.name AS name"])
            .join("game_categories", "game_categories.category_id = categories.id")
            .where_eq("game_categories.game_id", game_id)
            .order_by_asc("categories.name")
            .fetch_mapped(&self.db)
            .await
    }

    /// Store a book with its authors in credit order, returning the new id
    pub async fn add_book(&self, book: &NewBook) -> Result<i64> {
        let mut plan = TransactionPlan::new();
        let parent = plan.push(
            InsertBuilder::new("books")
                .value("title", book.title.trim())
                .value("isbn", book.isbn.clone())
                .value("format", book.format)
                .value("reading_status", book.reading_status)
                .value("pages", book.pages)
                .value("series_id", book.series_id)
                .value("created_at", Utc::now())
                .returning(&["id"]),
        )?;

        for (position, author) in book.authors.iter().enumerate() {
            let author_step = plan.push(upsert_named("authors", author))?;
            plan.push(
                TransactionStep::from(
                    InsertBuilder::new("book_authors")
                        .value_placeholder("book_id", "book_id")
                        .value_placeholder("author_id", "author_id")
                        .value("position", position as i64),
                )
                .bind_from("book_id", parent, "id")
                .bind_from("author_id", author_step, "id"),
            )?;
        }

        let results = self.planner.execute(&plan).await?;
        step_id(&results, parent)
    }

    /// One book by id
    pub async fn get_book(&self, id: i64) -> Result<Option<Book>> {
        SelectBuilder::new("books")
            .where_eq("id", id)
            .fetch_one_mapped(&self.db)
            .await
    }

    /// Authors of a book in credit order
    pub async fn authors_of(&self, book_id: i64) -> Result<Vec<Named>> {
        SelectBuilder::new("authors")
            .columns(&["authors.id AS id", "authors.name AS name"])
            .join("book_authors", "book_authors.author_id = authors.id")
            .where_eq("book_authors.book_id", book_id)
            .order_by_asc("book_authors.position")
            .fetch_mapped(&self.db)
            .await
    }
}

/// Insert a name into a lookup table, returning the id of the new or existing row
///
/// `DO UPDATE` rather than `DO NOTHING` so that `RETURNING` yields the
/// existing row on conflict.
fn upsert_named(table: &str, name: &str) -> InsertBuilder {
    InsertBuilder::new(table)
        .value("name", name.trim())
        .on_conflict_do_update(&["name"], &["name"])
        .returning(&["id"])
}

fn step_id(results: &crate::core::plan::StepResults, step: usize) -> Result<i64> {
    results
        .value(step, "id")
        .and_then(DatabaseValue::as_long)
        .ok_or_else(|| DatabaseError::query(format!("step {} returned no id", step)))
}

fn long_column(row: &crate::core::value::DatabaseRow, column: &str) -> Result<i64> {
    row.get(column)
        .and_then(DatabaseValue::as_long)
        .ok_or_else(|| DatabaseError::ColumnNotFound(column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{BookFormat, Language, PublicationType};
    use crate::catalog::schema::migrate;
    use crate::core::database::Executor;

    async fn repository() -> CatalogRepository {
        let db = PooledSqliteDatabase::in_memory().await.unwrap();
        migrate(db.clone()).await.unwrap();
        CatalogRepository::new(db)
    }

    fn new_media(titles: &[&str]) -> NewAsianMedia {
        NewAsianMedia {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            publication_type: PublicationType::Manhwa,
            language: Language::Korean,
            source_url: Some("https://example.org/tower".into()),
        }
    }

    #[tokio::test]
    async fn test_add_and_get_asian_media() {
        let repo = repository().await;
        let id = repo
            .add_asian_media(&new_media(&["Tower of God", " 신의 탑 "]))
            .await
            .unwrap();

        let media = repo.get_asian_media(id).await.unwrap().unwrap();
        assert_eq!(media.publication_type, PublicationType::Manhwa);
        assert_eq!(media.reading_status, ReadingStatus::PlanToRead);
        assert_eq!(media.primary_title(), Some("Tower of God"));
        assert_eq!(media.titles[1].title, "신의 탑");

        let found = repo
            .find_title(&["  tower OF god".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.asian_media_id, id);
        assert_eq!(found.title, "Tower of God");
        assert!(repo.find_title(&["Unknown".into()]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_title_rolls_back_whole_entry() {
        let repo = repository().await;
        repo.add_asian_media(&new_media(&["Solo Leveling"])).await.unwrap();

        let err = repo
            .add_asian_media(&new_media(&["Only I Level Up", "solo leveling"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::StepFailed { step: 2, .. }));

        let count = repo
            .database()
            .query("SELECT COUNT(*) AS n FROM asian_media")
            .await
            .unwrap();
        assert_eq!(count[0]["n"].as_long(), Some(1));
        assert!(repo
            .find_title(&["Only I Level Up".into()])
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_progress_and_delete() {
        let repo = repository().await;
        let id = repo.add_asian_media(&new_media(&["Omniscient Reader"])).await.unwrap();

        let progress = Progress {
            current: 42,
            total: Some(551),
            unit: Some("chapter".into()),
        };
        assert!(repo
            .update_progress(id, ReadingStatus::Reading, Some(&progress))
            .await
            .unwrap());
        assert!(repo.rate_asian_media(id, Some(9.5)).await.unwrap());

        let media = repo.get_asian_media(id).await.unwrap().unwrap();
        assert_eq!(media.progress, Some(progress));
        assert_eq!(media.rating, Some(9.5));

        repo.tag_asian_media(id, &["action", "regression", "action"])
            .await
            .unwrap();
        let tags: Vec<String> = repo.tags_of(id).await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(tags, vec!["action", "regression"]);

        assert!(repo.delete_asian_media(id).await.unwrap());
        assert!(repo.titles_of(id).await.unwrap().is_empty());
        assert!(!repo.delete_asian_media(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_games_with_shared_categories() {
        let repo = repository().await;
        let series = repo.add_series("Souls", Some("FromSoftware")).await.unwrap();
        assert_eq!(repo.add_series("Souls", None).await.unwrap(), series);

        let first = repo
            .add_game(&NewGame {
                title: "Dark Souls".into(),
                status: Some(GameStatus::Finished),
                rating: Some(9),
                series_id: Some(series),
                categories: vec!["RPG".into(), "Action".into()],
                ..NewGame::default()
            })
            .await
            .unwrap();
        let second = repo
            .add_game(&NewGame {
                title: "Hollow Knight".into(),
                categories: vec!["Action".into()],
                ..NewGame::default()
            })
            .await
            .unwrap();

        let game = repo.get_game(second).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::Backlog);
        assert_eq!(
            repo.categories_of_game(first)
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect::<Vec<_>>(),
            vec!["Action", "RPG"]
        );

        assert!(repo.set_game_status(second, GameStatus::Playing).await.unwrap());
        let playing = repo.games_with_status(GameStatus::Playing).await.unwrap();
        assert_eq!(playing.len(), 1);
        assert_eq!(playing[0].title, "Hollow Knight");

        let categories = repo.database().query("SELECT id FROM categories").await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(repo.series().await.unwrap()[0].publisher.as_deref(), Some("FromSoftware"));
    }

    #[tokio::test]
    async fn test_book_authors_keep_credit_order() {
        let repo = repository().await;
        let id = repo
            .add_book(&NewBook {
                title: "Good Omens".into(),
                isbn: Some("9780060853983".into()),
                format: BookFormat::Paperback,
                reading_status: ReadingStatus::Completed,
                pages: Some(412),
                series_id: None,
                authors: vec!["Terry Pratchett".into(), "Neil Gaiman".into()],
            })
            .await
            .unwrap();

        let book = repo.get_book(id).await.unwrap().unwrap();
        assert_eq!(book.format, BookFormat::Paperback);
        let authors: Vec<String> = repo
            .authors_of(id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(authors, vec!["Terry Pratchett", "Neil Gaiman"]);
    }
}
