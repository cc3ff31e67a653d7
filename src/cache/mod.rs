//! Local record cache.
//!
//! This module provides the storage side of the table browser:
//! - Records are upserted by id into a per-table namespace
//! - Records can be looked up by id list or iterated in full (offline paging)
//! - Table query state is persisted as small serialized values

mod storage;
mod traits;

pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::{JsonRecord, PageSource, TablePage, TableRecord};
