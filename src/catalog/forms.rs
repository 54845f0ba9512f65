//! Catalog form schemas

use super::model::{Language, NewAsianMedia, PublicationType};
use super::repository::CatalogRepository;
use crate::core::error::{DatabaseError, Result};
use crate::core::naming::NamingConvention;
use crate::core::registry::DbEnum;
use crate::form::{
    FieldDefinition, FieldError, FormSchema, FormValidator, FormValues, MaxLength, MinEntries,
    Required, UniqueEntries, Url, ValidationError,
};
use async_trait::async_trait;

pub const TITLES: &str = "titles";
pub const TYPE: &str = "type";
pub const LANGUAGE: &str = "language";
pub const SOURCE_URL: &str = "sourceUrl";

/// Rejects titles already stored for another entry
#[derive(Debug, Clone)]
pub struct ExistingTitleValidator {
    repository: CatalogRepository,
}

impl ExistingTitleValidator {
    /// Validator backed by the catalog's title table
    pub fn new(repository: CatalogRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl FormValidator for ExistingTitleValidator {
    async fn validate(&self, values: &FormValues) -> Result<Vec<FieldError>> {
        let existing = self.repository.existing_titles(&values.list(TITLES)).await?;
        Ok(existing
            .into_iter()
            .map(|value| FieldError::field(TITLES, ValidationError::AlreadyExists { value }))
            .collect())
    }
}

/// Form used by the catalog UI and the extension endpoint to add an entry
pub fn asian_media_form(repository: CatalogRepository) -> FormSchema {
    FormSchema::new("asian_media")
        .field(
            FieldDefinition::text_list(TITLES)
                .label("field.titles")
                .validator(MinEntries(1))
                .validator(MaxLength(500))
                .validator(UniqueEntries),
        )
        .field(
            FieldDefinition::choice::<PublicationType>(TYPE)
                .label("field.publication_type")
                .validator(Required),
        )
        .field(FieldDefinition::choice::<Language>(LANGUAGE).validator(Required))
        .field(
            FieldDefinition::text(SOURCE_URL)
                .validator(MaxLength(2048))
                .validator(Url),
        )
        .validator(ExistingTitleValidator::new(repository))
}

impl NewAsianMedia {
    /// Values of a form built by [`asian_media_form`] that passed validation
    pub fn from_form(values: &FormValues) -> Result<Self> {
        Ok(Self {
            titles: values.list(TITLES),
            publication_type: values
                .enum_value(TYPE)
                .ok_or_else(|| DatabaseError::missing_field("asian_media_form", TYPE, TYPE))?,
            language: values
                .enum_value(LANGUAGE)
                .ok_or_else(|| DatabaseError::missing_field("asian_media_form", LANGUAGE, LANGUAGE))?,
            source_url: values.text(SOURCE_URL),
        })
    }

    /// Form values for this input
    pub fn to_form(&self) -> FormValues {
        FormValues::new()
            .with(TITLES, self.titles.clone())
            .with(TYPE, choice_value(self.publication_type))
            .with(LANGUAGE, choice_value(self.language))
            .with(SOURCE_URL, self.source_url.clone())
    }
}

pub(crate) fn choice_value<E: DbEnum>(value: E) -> String {
    NamingConvention::UpperSnakeCase.apply(value.code_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PooledSqliteDatabase;
    use crate::catalog::schema::migrate;
    use crate::form::{Form, FormError};
    use std::sync::Arc;

    async fn repository() -> CatalogRepository {
        let db = PooledSqliteDatabase::in_memory().await.unwrap();
        migrate(db.clone()).await.unwrap();
        CatalogRepository::new(db)
    }

    fn input(titles: &[&str]) -> NewAsianMedia {
        NewAsianMedia {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            publication_type: PublicationType::LightNovel,
            language: Language::Japanese,
            source_url: None,
        }
    }

    #[tokio::test]
    async fn test_valid_form_round_trips_input() {
        let repo = repository().await;
        let mut form = Form::new(Arc::new(asian_media_form(repo)));
        form.load(&input(&["Spice and Wolf"]).to_form()).unwrap();

        let values = form.submit().await.unwrap();
        assert_eq!(NewAsianMedia::from_form(&values).unwrap(), input(&["Spice and Wolf"]));
    }

    #[tokio::test]
    async fn test_existing_title_is_field_error() {
        let repo = repository().await;
        repo.add_asian_media(&input(&["Overlord"])).await.unwrap();

        let mut form = Form::new(Arc::new(asian_media_form(repo)));
        form.load(&input(&["Spice and Wolf", "overlord "]).to_form())
            .unwrap();

        let Err(FormError::Rejected(rejected)) = form.submit().await else {
            panic!("expected rejection");
        };
        assert_eq!(
            rejected.for_field(TITLES).collect::<Vec<_>>(),
            vec![&ValidationError::AlreadyExists {
                value: "overlord".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_bad_choice_and_url() {
        let repo = repository().await;
        let mut form = Form::new(Arc::new(asian_media_form(repo)));
        form.set_value(TITLES, vec!["Berserk".to_string()]).unwrap();
        form.set_value(TYPE, "radio drama").unwrap();
        form.set_value(SOURCE_URL, "mailto:someone@example.org").unwrap();

        let Err(FormError::Rejected(rejected)) = form.submit().await else {
            panic!("expected rejection");
        };
        let fields: Vec<_> = rejected
            .errors
            .iter()
            .map(|e| e.field.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(fields, vec![TYPE, LANGUAGE, SOURCE_URL]);
    }
}
