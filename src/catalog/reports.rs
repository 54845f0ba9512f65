//! Report definitions over the catalog tables

use super::model::{BookFormat, GameStatus, Language, PublicationType, ReadingStatus};
use crate::core::error::Result;
use crate::core::mapping::{FieldDescriptor, FieldType, FromRecord, Record, TypeDescriptor};
use crate::core::naming::NamingConvention;
use crate::core::query_builder::{OrderDirection, SelectBuilder};
use crate::core::registry::DbEnum;
use crate::report::{ReportColumn, ReportDefinition};

pub const ASIAN_MEDIA_REPORT: &str = "asian_media";
pub const GAMES_REPORT: &str = "games";
pub const BOOKS_REPORT: &str = "books";

/// Asian media with their primary title and series
pub fn asian_media_report(page_size: usize) -> ReportDefinition {
    let base = SelectBuilder::new("asian_media")
        .left_join(
            "asian_media_titles",
            "asian_media_titles.asian_media_id = asian_media.id AND asian_media_titles.position = 0",
        )
        .left_join("series", "series.id = asian_media.series_id");

    ReportDefinition::new(ASIAN_MEDIA_REPORT, base)
        .column(ReportColumn::integer("id", "asian_media.id").filterable(false))
        .column(ReportColumn::text("title", "asian_media_titles.title"))
        .column(ReportColumn::enumeration::<PublicationType>(
            "type",
            "asian_media.publication_type",
        ))
        .column(ReportColumn::enumeration::<Language>("language", "asian_media.language"))
        .column(ReportColumn::enumeration::<ReadingStatus>(
            "status",
            "asian_media.reading_status",
        ))
        .column(ReportColumn::text("series", "series.name"))
        .column(ReportColumn::real("rating", "asian_media.rating"))
        .default_sort("title", OrderDirection::Asc)
        .page_size(page_size)
}

/// Games with their series, sorted by title
pub fn games_report(page_size: usize) -> ReportDefinition {
    let base = SelectBuilder::new("games").left_join("series", "series.id = games.series_id");

    ReportDefinition::new(GAMES_REPORT, base)
        .column(ReportColumn::integer("id", "games.id").filterable(false))
        .column(ReportColumn::text("title", "games.title"))
        .column(ReportColumn::text("platform", "games.platform"))
        .column(ReportColumn::enumeration::<GameStatus>("status", "games.status"))
        .column(ReportColumn::integer("rating", "games.rating"))
        .column(ReportColumn::real("hours", "games.hours_played"))
        .column(ReportColumn::integer("year", "games.release_year").label("column.release_year"))
        .column(ReportColumn::text("series", "series.name"))
        .default_sort("title", OrderDirection::Asc)
        .page_size(page_size)
}

/// Author names of `books.id`, comma separated in credit order
const CREDITED_AUTHORS: &str = "(SELECT GROUP_CONCAT(authors.name, ', ' ORDER BY book_authors.position) \
    FROM book_authors JOIN authors ON authors.id = book_authors.author_id \
    WHERE book_authors.book_id = books.id)";

/// Books with their authors joined in credit order
pub fn books_report(page_size: usize) -> ReportDefinition {
    let base = SelectBuilder::new("books");

    ReportDefinition::new(BOOKS_REPORT, base)
        .column(ReportColumn::integer("id", "books.id").filterable(false))
        .column(ReportColumn::text("title", "books.title"))
        .column(
            ReportColumn::text("authors", CREDITED_AUTHORS)
                .filterable(false)
                .sortable(false),
        )
        .column(ReportColumn::enumeration::<BookFormat>("format", "books.format"))
        .column(ReportColumn::enumeration::<ReadingStatus>(
            "status",
            "books.reading_status",
        ))
        .column(ReportColumn::integer("pages", "books.pages"))
        .default_sort("title", OrderDirection::Asc)
        .page_size(page_size)
}

/// Every catalog report
pub fn all_reports(page_size: usize) -> Vec<ReportDefinition> {
    vec![
        asian_media_report(page_size),
        games_report(page_size),
        books_report(page_size),
    ]
}

/// One row of [`asian_media_report`]
#[derive(Debug, Clone, PartialEq)]
pub struct AsianMediaListing {
    pub id: i64,
    pub title: Option<String>,
    pub publication_type: PublicationType,
    pub language: Language,
    pub status: ReadingStatus,
    pub series: Option<String>,
    pub rating: Option<f64>,
}

const ASIAN_MEDIA_LISTING: TypeDescriptor = TypeDescriptor {
    name: "asian_media_listing",
    table: None,
    convention: NamingConvention::AsIs,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::optional("title", FieldType::Text),
        FieldDescriptor::required("type", FieldType::Enum(PublicationType::DESCRIPTOR)),
        FieldDescriptor::required("language", FieldType::Enum(Language::DESCRIPTOR)),
        FieldDescriptor::required("status", FieldType::Enum(ReadingStatus::DESCRIPTOR)),
        FieldDescriptor::optional("series", FieldType::Text),
        FieldDescriptor::optional("rating", FieldType::Double),
    ],
};

impl FromRecord for AsianMediaListing {
    const DESCRIPTOR: &'static TypeDescriptor = &ASIAN_MEDIA_LISTING;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            title: record.opt_string("title")?,
            publication_type: record.enum_value("type")?,
            language: record.enum_value("language")?,
            status: record.enum_value("status")?,
            series: record.opt_string("series")?,
            rating: record.opt_double("rating")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PooledSqliteDatabase;
    use crate::catalog::model::{NewAsianMedia, NewBook};
    use crate::catalog::repository::CatalogRepository;
    use crate::catalog::schema::migrate;
    use crate::core::query_builder::NullHandling;
    use crate::report::{FilterData, FilterMode, ReportView};
    use std::sync::Arc;

    async fn seeded() -> CatalogRepository {
        let db = PooledSqliteDatabase::in_memory().await.unwrap();
        migrate(db.clone()).await.unwrap();
        let repo = CatalogRepository::new(db);
        for (title, kind, language) in [
            ("Vinland Saga", PublicationType::Manga, Language::Japanese),
            ("The Beginning After the End", PublicationType::WebNovel, Language::English),
            ("Lookism", PublicationType::Manhwa, Language::Korean),
            ("Mushoku Tensei", PublicationType::LightNovel, Language::Japanese),
        ] {
            repo.add_asian_media(&NewAsianMedia {
                titles: vec![title.to_string()],
                publication_type: kind,
                language,
                source_url: None,
            })
            .await
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_enum_filter_and_mapping() {
        let repo = seeded().await;
        let mut view = ReportView::open(Arc::new(asian_media_report(10)), repo.database().clone())
            .await
            .unwrap();
        assert_eq!(view.total(), 4);

        view.set_filter("language", FilterData::new("japanese").mode(FilterMode::Equals))
            .await
            .unwrap();
        let listings: Vec<AsianMediaListing> = view.records().unwrap();
        let titles: Vec<_> = listings.iter().filter_map(|l| l.title.as_deref()).collect();
        assert_eq!(titles, vec!["Mushoku Tensei", "Vinland Saga"]);
        assert_eq!(listings[0].publication_type, PublicationType::LightNovel);
        assert_eq!(listings[0].status, ReadingStatus::PlanToRead);
    }

    #[tokio::test]
    async fn test_null_rating_handling() {
        let repo = seeded().await;
        let lookism = repo.find_title(&["Lookism".into()]).await.unwrap().unwrap();
        repo.rate_asian_media(lookism.asian_media_id, Some(7.0)).await.unwrap();

        let mut view = ReportView::open(Arc::new(asian_media_report(10)), repo.database().clone())
            .await
            .unwrap();
        let filter = FilterData::new("8").mode(FilterMode::GreaterOrEqual);
        view.set_filter("rating", filter.clone()).await.unwrap();
        assert_eq!(view.total(), 0);

        view.set_filter("rating", filter.null_handling(NullHandling::IncludeNull))
            .await
            .unwrap();
        assert_eq!(view.total(), 3);
    }

    #[tokio::test]
    async fn test_books_report_lists_authors_in_credit_order() {
        let repo = seeded().await;
        // Peter Straub gets the lower author id
        repo.add_book(&NewBook {
            title: "Ghost Story".into(),
            isbn: None,
            format: BookFormat::Paperback,
            reading_status: ReadingStatus::Completed,
            pages: Some(483),
            series_id: None,
            authors: vec!["Peter Straub".into()],
        })
        .await
        .unwrap();
        let talisman = repo.add_book(&NewBook {
            title: "The Talisman".into(),
            isbn: None,
            format: BookFormat::Hardcover,
            reading_status: ReadingStatus::Reading,
            pages: Some(646),
            series_id: None,
            authors: vec!["Stephen King".into(), "Peter Straub".into()],
        })
        .await
        .unwrap();

        let credited: Vec<String> = repo
            .authors_of(talisman)
            .await
            .unwrap()
            .into_iter()
            .map(|author| author.name)
            .collect();
        assert_eq!(credited, vec!["Stephen King", "Peter Straub"]);

        let view = ReportView::open(Arc::new(books_report(10)), repo.database().clone())
            .await
            .unwrap();
        assert_eq!(view.total(), 2);
        let row = view
            .rows()
            .iter()
            .find(|row| row["title"].as_str() == Some("The Talisman"))
            .expect("The Talisman is listed");
        assert_eq!(row["authors"].as_string(), "Stephen King, Peter Straub");
        assert_eq!(row["format"].as_str(), Some("hardcover"));
    }
}
