//! Catalog enums and records

use crate::core::error::Result;
use crate::core::mapping::{FieldDescriptor, FieldType, FromRecord, Record, TypeDescriptor};
use crate::core::naming::NamingConvention;
use crate::core::registry::DbEnum;
use crate::core::value::DatabaseValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::db_enum! {
    /// Publication format of an Asian media entry
    pub enum PublicationType as "publication_type" with UpperSnakeCase {
        Novel,
        LightNovel,
        WebNovel,
        Manga,
        Manhwa,
        Manhua,
        Comic,
    }
}

crate::db_enum! {
    /// Original language of a work
    pub enum Language as "language" with UpperSnakeCase {
        Japanese,
        Korean,
        Chinese,
        English,
        Other,
    }
}

crate::db_enum! {
    pub enum ReadingStatus as "reading_status" with SnakeCase {
        PlanToRead,
        Reading,
        Completed,
        OnHold,
        Dropped,
    }
}

crate::db_enum! {
    pub enum GameStatus as "game_status" with PascalCase {
        Wishlist,
        Backlog,
        Playing,
        Finished,
        Abandoned,
    }
}

crate::db_enum! {
    pub enum BookFormat as "book_format" with KebabCase {
        Hardcover,
        Paperback,
        Ebook,
        Audiobook,
    }
}

/// Reading progress, stored as a JSON object in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Chapters or volumes read
    pub current: i64,
    pub total: Option<i64>,
    /// What `current` counts (`chapter`, `volume`)
    pub unit: Option<String>,
}

const PROGRESS: TypeDescriptor = TypeDescriptor {
    name: "progress",
    table: None,
    convention: NamingConvention::SnakeCase,
    fields: &[
        FieldDescriptor::required("current", FieldType::Long),
        FieldDescriptor::optional("total", FieldType::Long),
        FieldDescriptor::optional("unit", FieldType::Text),
    ],
};

impl Progress {
    /// Progress at `current`, out of `total` when known
    pub fn new(current: i64, total: Option<i64>) -> Self {
        Self {
            current,
            total,
            unit: None,
        }
    }

    /// Composite value for storage
    pub fn to_value(&self) -> DatabaseValue {
        PROGRESS.composite_value([
            ("current", DatabaseValue::Long(self.current)),
            ("total", self.total.into()),
            ("unit", self.unit.clone().into()),
        ])
    }
}

impl FromRecord for Progress {
    const DESCRIPTOR: &'static TypeDescriptor = &PROGRESS;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            current: record.long("current")?,
            total: record.opt_long("total")?,
            unit: record.opt_string("unit")?,
        })
    }
}

/// A novel, manga, manhwa or similar entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsianMedia {
    pub id: i64,
    pub publication_type: PublicationType,
    pub language: Language,
    pub reading_status: ReadingStatus,
    pub source_url: Option<String>,
    pub series_id: Option<i64>,
    pub progress: Option<Progress>,
    pub rating: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Filled in separately; the primary title comes first
    pub titles: Vec<AsianMediaTitle>,
}

const ASIAN_MEDIA: TypeDescriptor = TypeDescriptor {
    name: "asian_media",
    table: Some("asian_media"),
    convention: NamingConvention::SnakeCase,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::required(
            "publicationType",
            FieldType::Enum(PublicationType::DESCRIPTOR),
        ),
        FieldDescriptor::required("language", FieldType::Enum(Language::DESCRIPTOR)),
        FieldDescriptor::required("readingStatus", FieldType::Enum(ReadingStatus::DESCRIPTOR)),
        FieldDescriptor::optional("sourceUrl", FieldType::Text),
        FieldDescriptor::optional("seriesId", FieldType::Long),
        FieldDescriptor::optional("progress", FieldType::Composite(&PROGRESS)),
        FieldDescriptor::optional("rating", FieldType::Double),
        FieldDescriptor::optional("notes", FieldType::Text),
        FieldDescriptor::required("createdAt", FieldType::Timestamp),
    ],
};

impl FromRecord for AsianMedia {
    const DESCRIPTOR: &'static TypeDescriptor = &ASIAN_MEDIA;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            publication_type: record.enum_value("publicationType")?,
            language: record.enum_value("language")?,
            reading_status: record.enum_value("readingStatus")?,
            source_url: record.opt_string("sourceUrl")?,
            series_id: record.opt_long("seriesId")?,
            progress: record.opt_composite("progress")?,
            rating: record.opt_double("rating")?,
            notes: record.opt_string("notes")?,
            created_at: record.timestamp("createdAt")?,
            titles: Vec::new(),
        })
    }
}

impl AsianMedia {
    /// The primary title, if titles were loaded
    pub fn primary_title(&self) -> Option<&str> {
        self.titles.first().map(|t| t.title.as_str())
    }
}

/// One of the titles an Asian media entry is known under
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsianMediaTitle {
    pub id: i64,
    pub asian_media_id: i64,
    pub title: String,
    /// 0 for the primary title
    pub position: i32,
}

const ASIAN_MEDIA_TITLE: TypeDescriptor = TypeDescriptor {
    name: "asian_media_title",
    table: Some("asian_media_titles"),
    convention: NamingConvention::SnakeCase,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::required("asian_media_id", FieldType::Long),
        FieldDescriptor::required("title", FieldType::Text),
        FieldDescriptor::required("position", FieldType::Int),
    ],
};

impl FromRecord for AsianMediaTitle {
    const DESCRIPTOR: &'static TypeDescriptor = &ASIAN_MEDIA_TITLE;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            asian_media_id: record.long("asian_media_id")?,
            title: record.string("title")?,
            position: record.int("position")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: i64,
    pub name: String,
    pub publisher: Option<String>,
}

const SERIES: TypeDescriptor = TypeDescriptor {
    name: "series",
    table: Some("series"),
    convention: NamingConvention::SnakeCase,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::required("name", FieldType::Text),
        FieldDescriptor::optional("publisher", FieldType::Text),
    ],
};

impl FromRecord for Series {
    const DESCRIPTOR: &'static TypeDescriptor = &SERIES;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            name: record.string("name")?,
            publisher: record.opt_string("publisher")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: i64,
    pub title: String,
    pub platform: Option<String>,
    pub status: GameStatus,
    /// 1 to 10
    pub rating: Option<i32>,
    pub hours_played: Option<f64>,
    pub release_year: Option<i32>,
    pub series_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

const GAME: TypeDescriptor = TypeDescriptor {
    name: "game",
    table: Some("games"),
    convention: NamingConvention::SnakeCase,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::required("title", FieldType::Text),
        FieldDescriptor::optional("platform", FieldType::Text),
        FieldDescriptor::required("status", FieldType::Enum(GameStatus::DESCRIPTOR)),
        FieldDescriptor::optional("rating", FieldType::Int),
        FieldDescriptor::optional("hoursPlayed", FieldType::Double),
        FieldDescriptor::optional("releaseYear", FieldType::Int),
        FieldDescriptor::optional("seriesId", FieldType::Long),
        FieldDescriptor::required("createdAt", FieldType::Timestamp),
    ],
};

impl FromRecord for Game {
    const DESCRIPTOR: &'static TypeDescriptor = &GAME;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            title: record.string("title")?,
            platform: record.opt_string("platform")?,
            status: record.enum_value("status")?,
            rating: record.opt_int("rating")?,
            hours_played: record.opt_double("hoursPlayed")?,
            release_year: record.opt_int("releaseYear")?,
            series_id: record.opt_long("seriesId")?,
            created_at: record.timestamp("createdAt")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub isbn: Option<String>,
    pub format: BookFormat,
    pub reading_status: ReadingStatus,
    pub pages: Option<i32>,
    pub series_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

const BOOK: TypeDescriptor = TypeDescriptor {
    name: "book",
    table: Some("books"),
    convention: NamingConvention::SnakeCase,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::required("title", FieldType::Text),
        FieldDescriptor::optional("isbn", FieldType::Text),
        FieldDescriptor::required("format", FieldType::Enum(BookFormat::DESCRIPTOR)),
        FieldDescriptor::required("readingStatus", FieldType::Enum(ReadingStatus::DESCRIPTOR)),
        FieldDescriptor::optional("pages", FieldType::Int),
        FieldDescriptor::optional("seriesId", FieldType::Long),
        FieldDescriptor::required("createdAt", FieldType::Timestamp),
    ],
};

impl FromRecord for Book {
    const DESCRIPTOR: &'static TypeDescriptor = &BOOK;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            title: record.string("title")?,
            isbn: record.opt_string("isbn")?,
            format: record.enum_value("format")?,
            reading_status: record.enum_value("readingStatus")?,
            pages: record.opt_int("pages")?,
            series_id: record.opt_long("seriesId")?,
            created_at: record.timestamp("createdAt")?,
        })
    }
}

/// A named row of a lookup table (authors, categories, tags)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Named {
    pub id: i64,
    pub name: String,
}

const NAMED: TypeDescriptor = TypeDescriptor {
    name: "named",
    table: None,
    convention: NamingConvention::AsIs,
    fields: &[
        FieldDescriptor::required("id", FieldType::Long),
        FieldDescriptor::required("name", FieldType::Text),
    ],
};

impl FromRecord for Named {
    const DESCRIPTOR: &'static TypeDescriptor = &NAMED;

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.long("id")?,
            name: record.string("name")?,
        })
    }
}

/// Input for a new Asian media entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsianMedia {
    /// Primary title first
    pub titles: Vec<String>,
    #[serde(rename = "type")]
    pub publication_type: PublicationType,
    pub language: Language,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewGame {
    pub title: String,
    pub platform: Option<String>,
    pub status: Option<GameStatus>,
    pub rating: Option<i32>,
    pub hours_played: Option<f64>,
    pub release_year: Option<i32>,
    pub series_id: Option<i64>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub isbn: Option<String>,
    pub format: BookFormat,
    pub reading_status: ReadingStatus,
    pub pages: Option<i32>,
    pub series_id: Option<i64>,
    /// In credit order
    pub authors: Vec<String>,
}
