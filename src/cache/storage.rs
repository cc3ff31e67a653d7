//! Cache storage trait and SQLite implementation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::traits::TableRecord;
use crate::db;

/// Trait for local storage backends.
///
/// Holds two things: table records, grouped by namespace and keyed by
/// record id, and small serialized values such as persisted query state.
pub trait CacheStorage: Send + Sync + 'static {
  /// Insert or replace records by id.
  fn upsert_records<T: TableRecord>(&self, namespace: &str, records: &[T]) -> Result<()>;

  /// Look up records by id, in the order requested. Missing ids are skipped.
  fn get_records<T: TableRecord>(&self, namespace: &str, ids: &[String]) -> Result<Vec<T>>;

  /// Every record in a namespace, ordered by id.
  fn all_records<T: TableRecord>(&self, namespace: &str) -> Result<Vec<T>>;

  /// Remove records by id. Returns how many existed.
  fn delete_records(&self, namespace: &str, ids: &[String]) -> Result<usize>;

  /// Load a persisted value.
  fn load_state<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>>;

  /// Persist a value, replacing any previous one.
  fn save_state<V: Serialize>(&self, key: &str, value: &V) -> Result<()>;
}

/// In-memory storage. Nothing survives the process; used when persistence is
/// disabled and in tests.
#[derive(Default)]
pub struct MemoryStorage {
  records: Mutex<HashMap<String, BTreeMap<String, Value>>>,
  state: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
  mutex.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}

impl CacheStorage for MemoryStorage {
  fn upsert_records<T: TableRecord>(&self, namespace: &str, records: &[T]) -> Result<()> {
    let mut all = lock(&self.records)?;
    let table = all.entry(namespace.to_string()).or_default();
    for record in records {
      let value =
        serde_json::to_value(record).map_err(|e| eyre!("Failed to serialize record: {}", e))?;
      table.insert(record.record_id(), value);
    }
    Ok(())
  }

  fn get_records<T: TableRecord>(&self, namespace: &str, ids: &[String]) -> Result<Vec<T>> {
    let all = lock(&self.records)?;
    let Some(table) = all.get(namespace) else {
      return Ok(Vec::new());
    };
    ids
      .iter()
      .filter_map(|id| table.get(id))
      .map(|value| {
        serde_json::from_value(value.clone())
          .map_err(|e| eyre!("Failed to deserialize record: {}", e))
      })
      .collect()
  }

  fn all_records<T: TableRecord>(&self, namespace: &str) -> Result<Vec<T>> {
    let all = lock(&self.records)?;
    let Some(table) = all.get(namespace) else {
      return Ok(Vec::new());
    };
    table
      .values()
      .map(|value| {
        serde_json::from_value(value.clone())
          .map_err(|e| eyre!("Failed to deserialize record: {}", e))
      })
      .collect()
  }

  fn delete_records(&self, namespace: &str, ids: &[String]) -> Result<usize> {
    let mut all = lock(&self.records)?;
    let Some(table) = all.get_mut(namespace) else {
      return Ok(0);
    };
    Ok(ids.iter().filter(|id| table.remove(*id).is_some()).count())
  }

  fn load_state<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
    let state = lock(&self.state)?;
    state
      .get(key)
      .map(|raw| serde_json::from_str(raw).map_err(|e| eyre!("Failed to parse state {}: {}", key, e)))
      .transpose()
  }

  fn save_state<V: Serialize>(&self, key: &str, value: &V) -> Result<()> {
    let raw =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to serialize state: {}", e))?;
    lock(&self.state)?.insert(key.to_string(), raw);
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&db::default_path()?)
  }

  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      conn: Mutex::new(db::open(path)?),
    })
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self {
      conn: Mutex::new(db::open_in_memory()?),
    })
  }
}

impl CacheStorage for SqliteStorage {
  fn upsert_records<T: TableRecord>(&self, namespace: &str, records: &[T]) -> Result<()> {
    let mut conn = lock(&self.conn)?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    {
      let mut stmt = tx
        .prepare(
          "INSERT OR REPLACE INTO records (namespace, record_id, data, cached_at)
           VALUES (?, ?, ?, datetime('now'))",
        )
        .map_err(|e| eyre!("Failed to prepare upsert: {}", e))?;

      for record in records {
        let data =
          serde_json::to_vec(record).map_err(|e| eyre!("Failed to serialize record: {}", e))?;
        stmt
          .execute(params![namespace, record.record_id(), data])
          .map_err(|e| eyre!("Failed to store record: {}", e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get_records<T: TableRecord>(&self, namespace: &str, ids: &[String]) -> Result<Vec<T>> {
    let conn = lock(&self.conn)?;
    let mut stmt = conn
      .prepare("SELECT data FROM records WHERE namespace = ? AND record_id = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
      let data: Option<Vec<u8>> = stmt
        .query_row(params![namespace, id], |row| row.get(0))
        .optional()
        .map_err(|e| eyre!("Failed to query record {}: {}", id, e))?;

      if let Some(data) = data {
        let record: T = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize record {}: {}", id, e))?;
        records.push(record);
      }
    }

    Ok(records)
  }

  fn all_records<T: TableRecord>(&self, namespace: &str) -> Result<Vec<T>> {
    let conn = lock(&self.conn)?;
    let mut stmt = conn
      .prepare("SELECT data FROM records WHERE namespace = ? ORDER BY record_id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<Vec<u8>> = stmt
      .query_map(params![namespace], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query records: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read records: {}", e))?;

    rows
      .iter()
      .map(|data| {
        serde_json::from_slice(data).map_err(|e| eyre!("Failed to deserialize record: {}", e))
      })
      .collect()
  }

  fn delete_records(&self, namespace: &str, ids: &[String]) -> Result<usize> {
    let conn = lock(&self.conn)?;
    let mut deleted = 0;
    for id in ids {
      deleted += conn
        .execute(
          "DELETE FROM records WHERE namespace = ? AND record_id = ?",
          params![namespace, id],
        )
        .map_err(|e| eyre!("Failed to delete record {}: {}", id, e))?;
    }
    Ok(deleted)
  }

  fn load_state<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
    let conn = lock(&self.conn)?;
    let raw: Option<String> = conn
      .query_row(
        "SELECT value FROM kv_state WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to load state {}: {}", key, e))?;

    raw
      .map(|raw| serde_json::from_str(&raw).map_err(|e| eyre!("Failed to parse state {}: {}", key, e)))
      .transpose()
  }

  fn save_state<V: Serialize>(&self, key: &str, value: &V) -> Result<()> {
    let raw =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to serialize state: {}", e))?;
    let conn = lock(&self.conn)?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, raw],
      )
      .map_err(|e| eyre!("Failed to save state {}: {}", key, e))?;
    Ok(())
  }
}
