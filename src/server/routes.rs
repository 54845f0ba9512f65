//! Handlers of the extension API

use super::api::{AddRequest, AddResponse, CheckRequest, CheckResponse};
use crate::catalog::forms::TITLES;
use crate::catalog::NewAsianMedia;
use crate::context::AppContext;
use crate::form::{FieldError, FormError, FormRejected, FormSchema, ValidationError};
use crate::i18n::Translations;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::fmt::Display;

pub const ADD_PATH: &str = "/api/asian-media/add";
pub const CHECK_PATH: &str = "/api/asian-media/check";

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/asian-media/add
pub async fn add_asian_media(
    State(ctx): State<AppContext>,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> (StatusCode, Json<AddResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let message = invalid_request(ctx.translations(), &rejection);
            return (rejection.status(), Json(AddResponse::failure(message)));
        }
    };

    let mut form = ctx.asian_media_form();
    let submitted = match form.load(&request.to_form()) {
        Ok(()) => form.submit().await,
        Err(err) => Err(err),
    };
    let values = match submitted {
        Ok(values) => values,
        Err(FormError::Rejected(rejected)) => {
            let (status, message) = rejection_message(ctx.translations(), form.schema(), &rejected);
            tracing::info!(status = status.as_u16(), %message, "add request rejected");
            return (status, Json(AddResponse::failure(message)));
        }
        Err(err) => return add_failure(&ctx, &err),
    };

    let added = match NewAsianMedia::from_form(&values) {
        Ok(media) => ctx.repository().add_asian_media(&media).await,
        Err(err) => Err(err),
    };
    match added {
        Ok(id) => {
            tracing::info!(id, titles = ?values.list(TITLES), "added asian media");
            (
                StatusCode::OK,
                Json(AddResponse::added(id, ctx.translations().get("api.added"))),
            )
        }
        // Another request stored one of the titles after validation ran
        Err(err) if err.is_constraint_violation() => {
            tracing::info!(error = %err, "add lost a race on an existing title");
            let details = values.list(TITLES).join(", ");
            (
                StatusCode::CONFLICT,
                Json(AddResponse::failure(
                    ctx.translations()
                        .format("api.already_exists", &[("details", details)]),
                )),
            )
        }
        Err(err) => add_failure(&ctx, &err),
    }
}

/// POST /api/asian-media/check
pub async fn check_asian_media(
    State(ctx): State<AppContext>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> (StatusCode, Json<CheckResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let message = invalid_request(ctx.translations(), &rejection);
            return (rejection.status(), Json(CheckResponse::failure(message)));
        }
    };

    match ctx.repository().find_title(&request.titles).await {
        Ok(Some(found)) => {
            tracing::debug!(id = found.asian_media_id, title = %found.title, "title found");
            (StatusCode::OK, Json(CheckResponse::from(found)))
        }
        Ok(None) => (StatusCode::OK, Json(CheckResponse::not_found())),
        Err(err) => {
            ctx.errors().report("check asian media", &err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CheckResponse::failure(ctx.translations().get("api.database_error"))),
            )
        }
    }
}

fn add_failure(ctx: &AppContext, err: &dyn Display) -> (StatusCode, Json<AddResponse>) {
    ctx.errors().report("add asian media", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AddResponse::failure(ctx.translations().get("api.database_error"))),
    )
}

fn invalid_request(translations: &Translations, rejection: &JsonRejection) -> String {
    translations.format("api.invalid_request", &[("details", rejection.body_text())])
}

/// 409 when the only objection is titles already in the catalog, 422 otherwise
fn rejection_message(
    translations: &Translations,
    schema: &FormSchema,
    rejected: &FormRejected,
) -> (StatusCode, String) {
    let existing: Vec<&str> = rejected
        .errors
        .iter()
        .filter_map(|e| match &e.error {
            ValidationError::AlreadyExists { value } => Some(value.as_str()),
            _ => None,
        })
        .collect();

    if !existing.is_empty() && existing.len() == rejected.errors.len() {
        let details = existing.join(", ");
        return (
            StatusCode::CONFLICT,
            translations.format("api.already_exists", &[("details", details)]),
        );
    }

    let details = rejected
        .errors
        .iter()
        .map(|e| describe(translations, schema, e))
        .collect::<Vec<_>>()
        .join("; ");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        translations.format("api.validation_failed", &[("details", details)]),
    )
}

fn describe(translations: &Translations, schema: &FormSchema, error: &FieldError) -> String {
    let message = translations.validation_message(&error.error);
    match error.field.as_deref().and_then(|name| schema.get(name)) {
        Some(field) => format!("{}: {}", translations.get(field.label_key()), message),
        None => message,
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Router serving the extension API
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route(ADD_PATH, post(add_asian_media))
        .route(CHECK_PATH, post(check_asian_media))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PooledSqliteDatabase;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn context() -> AppContext {
        let db = PooledSqliteDatabase::in_memory().await.unwrap();
        AppContext::with_database(AppConfig::default(), db).await.unwrap()
    }

    async fn post_json(ctx: &AppContext, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response: Response = create_router(ctx.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn add_body(titles: &[&str]) -> Value {
        json!({ "titles": titles, "type": "MANHWA", "language": "KOREAN" })
    }

    #[tokio::test]
    async fn test_add_then_conflict() {
        let ctx = context().await;
        let (status, body) = post_json(&ctx, ADD_PATH, add_body(&["Tower of God"])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert!(body["newTitleId"].as_i64().is_some());

        let (status, body) = post_json(&ctx, ADD_PATH, add_body(&["  tower of god"])).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], json!(false));
        assert!(body.get("newTitleId").is_none());
        assert!(body["message"].as_str().unwrap().contains("tower of god"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_unprocessable() {
        let ctx = context().await;
        let (status, body) = post_json(
            &ctx,
            ADD_PATH,
            json!({ "titles": ["Noblesse", "noblesse"], "type": "OPERA", "language": "KOREAN" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Titles:"), "{}", message);
        assert!(message.contains("\"OPERA\""), "{}", message);
        assert_eq!(ctx.errors().count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let ctx = context().await;
        let (status, body) = post_json(&ctx, CHECK_PATH, json!({ "titles": "not a list" })).await;
        assert!(status.is_client_error());
        assert_eq!(body["found"], json!(false));
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_check() {
        let ctx = context().await;
        post_json(&ctx, ADD_PATH, add_body(&["The Breaker", "Breaker"])).await;

        let (status, body) = post_json(&ctx, CHECK_PATH, json!({ "titles": ["unknown", " BREAKER "] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["found"], json!(true));
        assert_eq!(body["matchedTitle"], json!("Breaker"));

        let (_, body) = post_json(&ctx, CHECK_PATH, json!({ "titles": [] })).await;
        assert_eq!(body, json!({ "found": false }));
    }
}
