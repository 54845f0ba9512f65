//! Report definitions and their live, paginated views

use super::column::ReportColumn;
use super::filter::{FilterData, SortConfiguration};
use crate::core::database::Executor;
use crate::core::error::{DatabaseError, Result};
use crate::core::mapping::{map_rows, FromRecord};
use crate::core::query_builder::{BuiltQuery, OrderDirection, SelectBuilder};
use crate::core::value::DatabaseRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Page size used when a definition does not set one
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Static description of a report
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    name: String,
    base: SelectBuilder,
    columns: Vec<ReportColumn>,
    default_sort: Option<SortConfiguration>,
    page_size: usize,
}

impl ReportDefinition {
    /// `base` supplies FROM, joins, GROUP BY and fixed conditions; the
    /// selected columns come from the report columns
    pub fn new(name: impl Into<String>, base: SelectBuilder) -> Self {
        Self {
            name: name.into(),
            base,
            columns: Vec::new(),
            default_sort: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn column(mut self, column: ReportColumn) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn default_sort(mut self, column: &str, direction: OrderDirection) -> Self {
        self.default_sort = Some(SortConfiguration::new(column, direction));
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Name the configuration is saved under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in display order
    pub fn columns(&self) -> &[ReportColumn] {
        &self.columns
    }

    /// Column by key
    pub fn get(&self, key: &str) -> Option<&ReportColumn> {
        self.columns.iter().find(|c| c.key() == key)
    }

    fn position(&self, key: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.key() == key)
            .ok_or_else(|| DatabaseError::ColumnNotFound(format!("{}.{}", self.name, key)))
    }

    /// Fresh state: no filters, default sort, default page size
    pub fn initial_state(&self) -> ReportState {
        ReportState {
            filters: BTreeMap::new(),
            sort: self.default_sort.clone(),
            page: 0,
            page_size: self.page_size,
        }
    }

    /// Base query with the report's columns, active filters and sort
    ///
    /// No LIMIT/OFFSET; see [`ReportDefinition::page_query`].
    pub fn query(&self, state: &ReportState) -> Result<SelectBuilder> {
        let selected: Vec<String> = self.columns.iter().map(ReportColumn::select_expr).collect();
        let selected: Vec<&str> = selected.iter().map(String::as_str).collect();
        let mut query = self.base.clone().columns(&selected);

        for (key, filter) in &state.filters {
            let index = self.position(key)?;
            if let Some(fragment) = self.columns[index].filter_fragment(filter, &format!("f{}", index))? {
                query = query.where_fragment(fragment);
            }
        }

        if let Some(sort) = &state.sort {
            let column = &self.columns[self.position(&sort.column)?];
            query = query.order_by(column.expr(), sort.direction);
        }
        Ok(query)
    }

    /// Query for the state's current page
    pub fn page_query(&self, state: &ReportState) -> Result<BuiltQuery> {
        Ok(self
            .query(state)?
            .limit(state.page_size)
            .offset(state.page * state.page_size)
            .to_query())
    }
}

/// Filters, sort and position of a report view
///
/// The page is not persisted; a restored configuration starts on page 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportState {
    #[serde(default)]
    pub filters: BTreeMap<String, FilterData>,
    #[serde(default)]
    pub sort: Option<SortConfiguration>,
    #[serde(skip)]
    pub page: usize,
    pub page_size: usize,
}

/// A report bound to a database, holding the current page
#[derive(Debug, Clone)]
pub struct ReportView<D> {
    definition: Arc<ReportDefinition>,
    db: D,
    state: ReportState,
    rows: Vec<DatabaseRow>,
    total: u64,
}

impl<D: Executor> ReportView<D> {
    /// Create the view and fetch its first page
    pub async fn open(definition: Arc<ReportDefinition>, db: D) -> Result<Self> {
        let state = definition.initial_state();
        Self::with_state(definition, db, state).await
    }

    /// Create the view from saved state; unknown columns are dropped
    pub async fn with_state(
        definition: Arc<ReportDefinition>,
        db: D,
        state: ReportState,
    ) -> Result<Self> {
        let initial = definition.initial_state();
        let mut view = Self {
            definition,
            db,
            state: initial,
            rows: Vec::new(),
            total: 0,
        };
        view.apply_state(state).await?;
        Ok(view)
    }

    /// The report being viewed
    pub fn definition(&self) -> &ReportDefinition {
        &self.definition
    }

    /// Current filters, sort and page
    pub fn state(&self) -> &ReportState {
        &self.state
    }

    /// Rows of the current page
    pub fn rows(&self) -> &[DatabaseRow] {
        &self.rows
    }

    /// Rows of the current page mapped as `T`
    pub fn records<T: FromRecord>(&self) -> Result<Vec<T>> {
        map_rows(&self.rows)
    }

    /// Rows matching the filters, over all pages
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of pages, at least one
    pub fn page_count(&self) -> usize {
        let size = self.state.page_size as u64;
        (self.total.div_ceil(size)).max(1) as usize
    }

    /// Re-run the current page and count queries
    pub async fn refresh(&mut self) -> Result<()> {
        let query = self.definition.query(&self.state)?;
        let count = self.db.fetch(&query.count_query()).await?;
        self.total = count
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|value| value.as_long())
            .unwrap_or(0)
            .max(0) as u64;

        let last_page = self.page_count() - 1;
        if self.state.page > last_page {
            self.state.page = last_page;
        }

        let page = query
            .limit(self.state.page_size)
            .offset(self.state.page * self.state.page_size);
        self.rows = page.fetch_all(&self.db).await?;
        tracing::debug!(
            report = %self.definition.name(),
            page = self.state.page,
            rows = self.rows.len(),
            total = self.total,
            "Report refreshed"
        );
        Ok(())
    }

    /// Replace the whole state, e.g. from a saved configuration
    pub async fn apply_state(&mut self, mut state: ReportState) -> Result<()> {
        let definition = Arc::clone(&self.definition);
        state.filters.retain(|key, _| {
            let known = definition.get(key).is_some_and(ReportColumn::is_filterable);
            if !known {
                tracing::warn!(report = %definition.name(), column = %key, "Dropping filter on unknown column");
            }
            known
        });
        if let Some(sort) = &state.sort {
            if !definition.get(&sort.column).is_some_and(ReportColumn::is_sortable) {
                tracing::warn!(report = %definition.name(), column = %sort.column, "Dropping sort on unknown column");
                state.sort = definition.default_sort.clone();
            }
        }
        state.page_size = state.page_size.max(1);
        self.state = state;
        self.refresh().await
    }

    /// Set the filter of one column and go back to the first page
    pub async fn set_filter(&mut self, key: &str, filter: FilterData) -> Result<()> {
        let column = self.filterable_column(key)?;
        // reject filter text that cannot convert before touching the state
        column.filter_fragment(&filter, "check")?;
        self.state.filters.insert(key.to_string(), filter);
        self.state.page = 0;
        self.refresh().await
    }

    /// Remove the filter on `key` and refetch
    pub async fn clear_filter(&mut self, key: &str) -> Result<()> {
        if self.state.filters.remove(key).is_some() {
            self.state.page = 0;
            self.refresh().await?;
        }
        Ok(())
    }

    /// Remove every filter and refetch
    pub async fn clear_filters(&mut self) -> Result<()> {
        self.state.filters.clear();
        self.state.page = 0;
        self.refresh().await
    }

    /// Sort on `key` and refetch the current page
    pub async fn set_sort(&mut self, key: &str, direction: OrderDirection) -> Result<()> {
        self.sortable_column(key)?;
        self.state.sort = Some(SortConfiguration::new(key, direction));
        self.refresh().await
    }

    /// Sort by `key` ascending, or flip the direction if already sorted by it
    pub async fn toggle_sort(&mut self, key: &str) -> Result<()> {
        let direction = match &self.state.sort {
            Some(sort) if sort.column == key => sort.direction.reversed(),
            _ => OrderDirection::Asc,
        };
        self.set_sort(key, direction).await
    }

    /// Go to a zero-based page, clamped to the last page
    pub async fn set_page(&mut self, page: usize) -> Result<()> {
        self.state.page = page;
        self.refresh().await
    }

    /// Change the page size and refetch from the first page
    pub async fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        self.state.page_size = page_size.max(1);
        self.state.page = 0;
        self.refresh().await
    }

    fn filterable_column(&self, key: &str) -> Result<&ReportColumn> {
        self.definition
            .get(key)
            .filter(|c| c.is_filterable())
            .ok_or_else(|| self.unknown_column(key))
    }

    fn sortable_column(&self, key: &str) -> Result<&ReportColumn> {
        self.definition
            .get(key)
            .filter(|c| c.is_sortable())
            .ok_or_else(|| self.unknown_column(key))
    }

    fn unknown_column(&self, key: &str) -> DatabaseError {
        DatabaseError::ColumnNotFound(format!("{}.{}", self.definition.name(), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PooledSqliteDatabase;
    use crate::core::query_builder::NullHandling;
    use crate::report::{ColumnKind, FilterMode};

    async fn games_db() -> PooledSqliteDatabase {
        let db = PooledSqliteDatabase::in_memory().await.unwrap();
        db.execute_batch(
            "CREATE TABLE games (id INTEGER PRIMARY KEY, title TEXT NOT NULL, rating INTEGER);
             INSERT INTO games (title, rating) VALUES
                ('Alpha', 9), ('Bravo', NULL), ('Charlie', 4), ('Delta', 7), ('Echo', NULL);",
        )
        .await
        .unwrap();
        db
    }

    fn definition() -> Arc<ReportDefinition> {
        Arc::new(
            ReportDefinition::new("games", SelectBuilder::new("games"))
                .column(ReportColumn::integer("id", "games.id").filterable(false))
                .column(ReportColumn::text("title", "games.title"))
                .column(ReportColumn::new("rating", "games.rating", ColumnKind::Integer))
                .default_sort("title", OrderDirection::Asc)
                .page_size(2),
        )
    }

    fn titles(view: &ReportView<PooledSqliteDatabase>) -> Vec<String> {
        view.rows()
            .iter()
            .map(|row| row["title"].as_string())
            .collect()
    }

    #[tokio::test]
    async fn test_pagination() {
        let mut view = ReportView::open(definition(), games_db().await).await.unwrap();
        assert_eq!(view.total(), 5);
        assert_eq!(view.page_count(), 3);
        assert_eq!(titles(&view), vec!["Alpha", "Bravo"]);

        view.set_page(2).await.unwrap();
        assert_eq!(titles(&view), vec!["Echo"]);

        view.set_page(10).await.unwrap();
        assert_eq!(view.state().page, 2);

        view.set_page_size(10).await.unwrap();
        assert_eq!(view.page_count(), 1);
        assert_eq!(view.rows().len(), 5);
    }

    #[tokio::test]
    async fn test_sort_toggle() {
        let mut view = ReportView::open(definition(), games_db().await).await.unwrap();
        view.toggle_sort("title").await.unwrap();
        assert_eq!(titles(&view), vec!["Echo", "Delta"]);

        view.toggle_sort("rating").await.unwrap();
        assert_eq!(
            view.state().sort,
            Some(SortConfiguration::ascending("rating"))
        );
    }

    #[tokio::test]
    async fn test_filter_recomputes_count_and_resets_page() {
        let mut view = ReportView::open(definition(), games_db().await).await.unwrap();
        view.set_page(1).await.unwrap();

        view.set_filter("rating", FilterData::new("5").mode(FilterMode::GreaterOrEqual))
            .await
            .unwrap();
        assert_eq!(view.state().page, 0);
        assert_eq!(view.total(), 2);
        assert_eq!(titles(&view), vec!["Alpha", "Delta"]);

        view.clear_filter("rating").await.unwrap();
        assert_eq!(view.total(), 5);
    }

    #[tokio::test]
    async fn test_include_null_keeps_null_rows() {
        let mut view = ReportView::open(definition(), games_db().await).await.unwrap();
        view.set_page_size(10).await.unwrap();

        let filter = FilterData::new("8")
            .mode(FilterMode::GreaterOrEqual)
            .null_handling(NullHandling::IncludeNull);
        view.set_filter("rating", filter).await.unwrap();
        assert_eq!(titles(&view), vec!["Alpha", "Bravo", "Echo"]);

        let filter = FilterData::new("100")
            .mode(FilterMode::GreaterOrEqual)
            .null_handling(NullHandling::IncludeNull);
        view.set_filter("rating", filter).await.unwrap();
        assert_eq!(titles(&view), vec!["Bravo", "Echo"]);

        view.set_filter("rating", FilterData::nulls(NullHandling::ExcludeNull))
            .await
            .unwrap();
        assert_eq!(view.total(), 3);
    }

    #[tokio::test]
    async fn test_rejects_unknown_and_invalid_filters() {
        let mut view = ReportView::open(definition(), games_db().await).await.unwrap();
        assert!(matches!(
            view.set_filter("id", FilterData::new("1")).await,
            Err(DatabaseError::ColumnNotFound(_))
        ));
        assert!(view.set_filter("rating", FilterData::new("lots")).await.is_err());
        assert!(view.state().filters.is_empty());
    }

    #[tokio::test]
    async fn test_saved_state_drops_unknown_columns() {
        let mut state = definition().initial_state();
        state.filters.insert("publisher".into(), FilterData::new("x"));
        state.sort = Some(SortConfiguration::descending("publisher"));

        let view = ReportView::with_state(definition(), games_db().await, state)
            .await
            .unwrap();
        assert!(view.state().filters.is_empty());
        assert_eq!(view.state().sort, Some(SortConfiguration::ascending("title")));
        assert_eq!(view.total(), 5);
    }
}
