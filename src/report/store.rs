//! Persisted report configurations

use super::view::{ReportState, ReportView};
use crate::core::database::Executor;
use crate::core::error::Result;
use crate::core::query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder};
use chrono::Utc;

/// Table holding one JSON configuration per report
pub const REPORT_CONFIGURATIONS_TABLE: &str = "report_configurations";

/// DDL for [`REPORT_CONFIGURATIONS_TABLE`]
pub const CREATE_REPORT_CONFIGURATIONS: &str = "CREATE TABLE IF NOT EXISTS report_configurations (
    report_name TEXT PRIMARY KEY,
    configuration TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// Loads and saves [`ReportState`] as JSON, keyed by report name
#[derive(Debug, Clone)]
pub struct ReportConfigurationStore<D> {
    db: D,
}

impl<D: Executor> ReportConfigurationStore<D> {
    /// Store on `db`; the table comes from the catalog migrations
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// Saved state of `report`, if any
    pub async fn load(&self, report: &str) -> Result<Option<ReportState>> {
        let stored = SelectBuilder::new(REPORT_CONFIGURATIONS_TABLE)
            .columns(&["configuration"])
            .where_eq("report_name", report)
            .fetch_scalar(&self.db, "configuration")
            .await?;

        match stored {
            Some(value) => Ok(Some(serde_json::from_str(&value.as_string())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the saved state of `report`
    pub async fn save(&self, report: &str, state: &ReportState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        InsertBuilder::new(REPORT_CONFIGURATIONS_TABLE)
            .value("report_name", report)
            .value("configuration", json)
            .value("updated_at", Utc::now().timestamp_micros())
            .on_conflict_do_update(&["report_name"], &["configuration", "updated_at"])
            .execute(&self.db)
            .await?;
        tracing::debug!(report = %report, "Saved report configuration");
        Ok(())
    }

    /// Forget the saved state of `report`; true when something was deleted
    pub async fn delete(&self, report: &str) -> Result<bool> {
        let deleted = DeleteBuilder::new(REPORT_CONFIGURATIONS_TABLE)
            .where_eq("report_name", report)
            .execute(&self.db)
            .await?;
        Ok(deleted > 0)
    }

    /// Save the current state of a view under its report name
    pub async fn save_view<V: Executor>(&self, view: &ReportView<V>) -> Result<()> {
        self.save(view.definition().name(), view.state()).await
    }

    /// Apply the saved state, if any, to a view
    pub async fn restore_view<V: Executor>(&self, view: &mut ReportView<V>) -> Result<bool> {
        match self.load(view.definition().name()).await? {
            Some(state) => {
                view.apply_state(state).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
