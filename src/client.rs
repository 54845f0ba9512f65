//! Client for the extension API
//!
//! Failures never surface as errors: an unreachable endpoint or an
//! unreadable reply comes back as `success: false` / `found: false` with a
//! translated message, which is what the extension shows the user.

use crate::i18n::Translations;
use crate::server::{AddRequest, AddResponse, CheckRequest, CheckResponse, ADD_PATH, CHECK_PATH};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response ({status}): {body}")]
    InvalidResponse { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    translations: Arc<Translations>,
}

impl CatalogClient {
    /// Client with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            translations: Arc::new(Translations::embedded().unwrap_or_default()),
        })
    }

    #[must_use]
    pub fn with_translations(mut self, translations: Arc<Translations>) -> Self {
        self.translations = translations;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Add an entry; failures come back as an unsuccessful response
    pub async fn add(&self, request: &AddRequest) -> AddResponse {
        match self.post_json(ADD_PATH, request).await {
            Ok(response) => response,
            Err(err) => AddResponse::failure(self.unreachable(ADD_PATH, &err)),
        }
    }

    /// Look up titles; failures come back as a not-found response carrying a message
    pub async fn check(&self, request: &CheckRequest) -> CheckResponse {
        match self.post_json(CHECK_PATH, request).await {
            Ok(response) => response,
            Err(err) => CheckResponse::failure(self.unreachable(CHECK_PATH, &err)),
        }
    }

    /// Error replies carry the same body as successes, so the body is
    /// decoded whatever the status
    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|_| ClientError::InvalidResponse {
            status: status.as_u16(),
            body: text,
        })
    }

    fn unreachable(&self, path: &str, err: &ClientError) -> String {
        tracing::warn!(path, error = %err, "extension API call failed");
        self.translations
            .format("api.unreachable", &[("details", err.to_string())])
    }
}
