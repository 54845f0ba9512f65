//! Request and response bodies of the extension API

use crate::catalog::forms::{choice_value, LANGUAGE, SOURCE_URL, TITLES, TYPE};
use crate::catalog::{NewAsianMedia, TitleMatch};
use crate::form::FormValues;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/asian-media/add`
///
/// Enum fields are taken as strings so an unknown value is reported as a
/// validation error rather than a malformed request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl AddRequest {
    /// The request as form values for the asian media form
    pub fn to_form(&self) -> FormValues {
        FormValues::new()
            .with(TITLES, self.titles.clone())
            .with(TYPE, self.publication_type.clone())
            .with(LANGUAGE, self.language.clone())
            .with(SOURCE_URL, self.source_url.clone())
    }
}

impl From<&NewAsianMedia> for AddRequest {
    fn from(media: &NewAsianMedia) -> Self {
        Self {
            titles: media.titles.clone(),
            publication_type: Some(choice_value(media.publication_type)),
            language: Some(choice_value(media.language)),
            source_url: media.source_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_title_id: Option<i64>,
    pub message: String,
}

impl AddResponse {
    /// A successful add
    pub fn added(id: i64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            new_title_id: Some(id),
            message: message.into(),
        }
    }

    /// A failed add
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            new_title_id: None,
            message: message.into(),
        }
    }
}

/// Body of `POST /api/asian-media/check`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub titles: Vec<String>,
}

impl CheckRequest {
    /// Check any of `titles`
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResponse {
    /// No matching title
    pub fn not_found() -> Self {
        Self::default()
    }

    /// The check could not be answered
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<TitleMatch> for CheckResponse {
    fn from(found: TitleMatch) -> Self {
        Self {
            found: true,
            title_id: Some(found.asian_media_id),
            matched_title: Some(found.title),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Language, PublicationType};
    use serde_json::json;

    #[test]
    fn test_add_request_wire_format() {
        let request: AddRequest = serde_json::from_value(json!({
            "titles": ["Omniscient Reader"],
            "type": "web_novel",
            "language": "KOREAN",
            "sourceUrl": "https://example.org/orv"
        }))
        .unwrap();
        assert_eq!(request.publication_type.as_deref(), Some("web_novel"));
        assert_eq!(request.source_url.as_deref(), Some("https://example.org/orv"));

        let partial: AddRequest = serde_json::from_value(json!({ "titles": [] })).unwrap();
        assert_eq!(partial.language, None);
    }

    #[test]
    fn test_add_request_from_input() {
        let media = NewAsianMedia {
            titles: vec!["Solo Leveling".into()],
            publication_type: PublicationType::WebNovel,
            language: Language::Korean,
            source_url: None,
        };
        let body = serde_json::to_value(AddRequest::from(&media)).unwrap();
        assert_eq!(
            body,
            json!({ "titles": ["Solo Leveling"], "type": "WEB_NOVEL", "language": "KOREAN" })
        );
    }

    #[test]
    fn test_responses_omit_absent_fields() {
        assert_eq!(
            serde_json::to_value(AddResponse::added(7, "Added")).unwrap(),
            json!({ "success": true, "newTitleId": 7, "message": "Added" })
        );
        assert_eq!(
            serde_json::to_value(CheckResponse::not_found()).unwrap(),
            json!({ "found": false })
        );
        let found = CheckResponse::from(TitleMatch {
            asian_media_id: 3,
            title: "Berserk".into(),
        });
        assert_eq!(
            serde_json::to_value(found).unwrap(),
            json!({ "found": true, "titleId": 3, "matchedTitle": "Berserk" })
        );
    }
}
