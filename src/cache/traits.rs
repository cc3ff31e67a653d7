//! Core traits and types for the record cache.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Trait for records that can be stored in the local record store.
///
/// Implementors must provide a stable identifier; upserts replace records with
/// the same identifier within a table namespace.
pub trait TableRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier for this record (e.g. the server's `_id`)
  fn record_id(&self) -> String;
}

/// A page of table records, including metadata about where it came from.
#[derive(Debug, Clone)]
pub struct TablePage<T> {
  /// Records in display order
  pub items: Vec<T>,
  /// Total number of records matching the query across all pages
  pub total_items: u64,
  /// Where the records came from
  pub source: PageSource,
}

impl<T> TablePage<T> {
  pub fn from_network(items: Vec<T>, total_items: u64) -> Self {
    Self {
      items,
      total_items,
      source: PageSource::Network,
    }
  }

  pub fn from_index(items: Vec<T>, total_items: u64) -> Self {
    Self {
      items,
      total_items,
      source: PageSource::Index,
    }
  }

  pub fn offline(items: Vec<T>, total_items: u64) -> Self {
    Self {
      items,
      total_items,
      source: PageSource::Offline,
    }
  }
}

/// Indicates where a page of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
  /// Fresh data from the server
  Network,
  /// In-memory index hit, records read from the local store
  Index,
  /// Offline mode - paginated from the local store without the server
  Offline,
}

/// Schemaless record identified by `_id`, falling back to `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonRecord(pub Value);

impl TableRecord for JsonRecord {
  fn record_id(&self) -> String {
    match self.0.get("_id").or_else(|| self.0.get("id")) {
      Some(Value::String(s)) => s.clone(),
      Some(Value::Null) | None => String::new(),
      Some(other) => other.to_string(),
    }
  }
}
