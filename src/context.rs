//! Application context
//!
//! One explicit object carrying what the binary, the extension endpoint and
//! the tests share: configuration, the pooled database, the catalog
//! repository, translations, the type registry and the error reporter.

use crate::backends::PooledSqliteDatabase;
use crate::catalog::{self, CatalogRepository};
use crate::config::AppConfig;
use crate::core::error::{DatabaseError, Result};
use crate::core::registry::TypeRegistry;
use crate::form::{Form, FormSchema};
use crate::i18n::Translations;
use crate::report::{ReportConfigurationStore, ReportDefinition, ReportView};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;

const DEFAULT_REPORTER_CAPACITY: usize = 100;

/// An error surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub context: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Keeps the most recent surfaced errors and logs each one
#[derive(Debug)]
pub struct ErrorReporter {
    capacity: usize,
    errors: Mutex<VecDeque<ReportedError>>,
    total: Mutex<u64>,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REPORTER_CAPACITY)
    }
}

impl ErrorReporter {
    /// Reporter keeping the `capacity` most recent errors
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            errors: Mutex::new(VecDeque::new()),
            total: Mutex::new(0),
        }
    }

    /// Record an error and log it
    pub fn report(&self, context: &str, error: &dyn Display) {
        tracing::error!(context, error = %error, "operation failed");

        let mut errors = self.errors.lock();
        if errors.len() == self.capacity {
            errors.pop_front();
        }
        errors.push_back(ReportedError {
            context: context.to_string(),
            message: error.to_string(),
            at: Utc::now(),
        });
        *self.total.lock() += 1;
    }

    /// Retained errors, oldest first
    pub fn recent(&self) -> Vec<ReportedError> {
        self.errors.lock().iter().cloned().collect()
    }

    /// Errors reported since creation, including ones no longer retained
    pub fn count(&self) -> u64 {
        *self.total.lock()
    }

    /// Forget every recorded error
    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

#[derive(Debug, Clone)]
pub struct AppContext {
    config: Arc<AppConfig>,
    db: PooledSqliteDatabase,
    repository: CatalogRepository,
    registry: Arc<TypeRegistry>,
    translations: Arc<Translations>,
    errors: Arc<ErrorReporter>,
    asian_media_form: Arc<FormSchema>,
    reports: Arc<Vec<Arc<ReportDefinition>>>,
}

impl AppContext {
    /// Open the configured database and bring its schema up to date
    pub async fn open(config: AppConfig) -> Result<Self> {
        let db = PooledSqliteDatabase::with_config(config.pool_config()).await?;
        Self::with_database(config, db).await
    }

    /// Build the context over an existing pool, migrating it first
    pub async fn with_database(config: AppConfig, db: PooledSqliteDatabase) -> Result<Self> {
        let applied = catalog::migrate(db.clone()).await?;
        if !applied.is_empty() {
            tracing::info!(?applied, "applied schema migrations");
        }

        let repository = CatalogRepository::new(db.clone());
        let reports = catalog::all_reports(config.page_size)
            .into_iter()
            .map(Arc::new)
            .collect();

        Ok(Self {
            asian_media_form: Arc::new(catalog::asian_media_form(repository.clone())),
            registry: Arc::new(catalog::type_registry()?),
            translations: Arc::new(Translations::embedded()?),
            errors: Arc::new(ErrorReporter::default()),
            reports: Arc::new(reports),
            config: Arc::new(config),
            repository,
            db,
        })
    }

    /// Replace the translation table
    #[must_use]
    pub fn with_translations(mut self, translations: Translations) -> Self {
        self.translations = Arc::new(translations);
        self
    }

    /// Effective configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The pooled database
    pub fn database(&self) -> &PooledSqliteDatabase {
        &self.db
    }

    /// Catalog repository
    pub fn repository(&self) -> &CatalogRepository {
        &self.repository
    }

    /// Registered enum and composite types
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Loaded translations
    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Errors surfaced so far
    pub fn errors(&self) -> &ErrorReporter {
        &self.errors
    }

    /// A fresh form for adding an Asian media entry
    pub fn asian_media_form(&self) -> Form {
        Form::new(Arc::clone(&self.asian_media_form))
    }

    /// Every report definition
    pub fn reports(&self) -> impl Iterator<Item = &ReportDefinition> {
        self.reports.iter().map(Arc::as_ref)
    }

    /// Saved report configurations
    pub fn report_store(&self) -> ReportConfigurationStore<PooledSqliteDatabase> {
        ReportConfigurationStore::new(self.db.clone())
    }

    /// Open a report by name with its saved configuration, if any
    pub async fn open_report(&self, name: &str) -> Result<ReportView<PooledSqliteDatabase>> {
        let definition = self
            .reports
            .iter()
            .find(|report| report.name() == name)
            .cloned()
            .ok_or_else(|| DatabaseError::UnknownType(name.to_string()))?;

        let mut view = ReportView::open(definition, self.db.clone()).await?;
        self.report_store().restore_view(&mut view).await?;
        Ok(view)
    }
}
