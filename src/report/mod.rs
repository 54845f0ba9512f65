//! Paginated, filterable reports
//!
//! A [`ReportDefinition`] couples a base [`SelectBuilder`](crate::core::SelectBuilder)
//! with [`ReportColumn`]s. A [`ReportView`] binds a definition to a database
//! and keeps one page of rows current: every filter, sort or paging change
//! rebuilds the query and re-fetches the page together with the total count.
//! [`ReportConfigurationStore`] persists the view state as JSON.

pub mod column;
pub mod filter;
pub mod store;
pub mod view;

pub use column::{ColumnKind, ReportColumn};
pub use filter::{FilterData, FilterMode, SortConfiguration};
pub use store::{ReportConfigurationStore, CREATE_REPORT_CONFIGURATIONS, REPORT_CONFIGURATIONS_TABLE};
pub use view::{ReportDefinition, ReportState, ReportView, DEFAULT_PAGE_SIZE};
