//! Paged, filtered views over server endpoints.

mod debounce;
mod error;
pub mod fingerprint;
pub mod offline;
mod query;
mod server_table;
mod ui_state;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use error::TableError;
pub use fingerprint::{fingerprint, table_url};
pub use query::{
  FilterValue, Filters, QueryState, SortDirection, SortSpec, TableOptions, DEFAULT_PAGE,
  DEFAULT_PAGE_SIZE,
};
pub use server_table::{IndexEntry, ServerDataTable, TableConfig, TOTAL_COUNT_HEADER};
pub use ui_state::{TableStatus, UiError, UiState};
