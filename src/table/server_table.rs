//! Server-backed table with a client-side index.
//!
//! Every fetched page is upserted into the local store by record id, and the
//! ordered id list is indexed under the query fingerprint. Asking for the same
//! query again is answered from the store without touching the network until
//! the index is reset or a refresh is forced.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use super::error::TableError;
use super::fingerprint::{fingerprint, table_url};
use super::offline;
use super::query::{Filters, QueryState, TableOptions, DEFAULT_PAGE};
use super::ui_state::UiState;
use crate::api::{ApiService, RequestOptions};
use crate::cache::{CacheStorage, TablePage, TableRecord};

/// Response header carrying the total number of matching records.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Clone)]
pub struct TableConfig {
  /// Table identifier; also the record namespace in the local store
  pub id: String,
  /// Endpoint path, relative to the service base address
  pub endpoint: String,
  pub defaults: TableOptions,
  /// Start from the persisted query state if there is one
  pub load_from_storage: bool,
  pub debounce: Duration,
}

impl TableConfig {
  pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      endpoint: endpoint.into(),
      defaults: TableOptions::default(),
      load_from_storage: true,
      debounce: DEFAULT_DEBOUNCE,
    }
  }

  pub fn with_defaults(mut self, defaults: TableOptions) -> Self {
    self.defaults = defaults;
    self
  }

  pub fn load_from_storage(mut self, enabled: bool) -> Self {
    self.load_from_storage = enabled;
    self
  }

  pub fn with_debounce(mut self, delay: Duration) -> Self {
    self.debounce = delay;
    self
  }
}

/// Ids of one fetched page, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
  pub record_ids: Vec<String>,
  pub total_items: u64,
}

struct TableState<T> {
  query: QueryState,
  ui: UiState,
  indexes: HashMap<String, IndexEntry>,
  current_fingerprint: Option<String>,
  items: Vec<T>,
  total_items: u64,
  offline: bool,
}

struct Inner<T, S> {
  id: String,
  state_key: String,
  endpoint: String,
  api: ApiService,
  storage: Arc<S>,
  defaults: QueryState,
  state: Mutex<TableState<T>>,
  values_debounce: Debouncer,
  filters_debounce: Debouncer,
}

/// Paged view over a server endpoint. Clones share state.
pub struct ServerDataTable<T, S> {
  inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for ServerDataTable<T, S> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T: TableRecord, S: CacheStorage> ServerDataTable<T, S> {
  pub fn new(config: TableConfig, api: ApiService, storage: Arc<S>) -> Result<Self, TableError> {
    let state_key = config.id.to_uppercase();
    let defaults = QueryState::from_options(&config.defaults);

    let query = if config.load_from_storage {
      match storage.load_state::<QueryState>(&state_key) {
        Ok(Some(mut saved)) => {
          debug!(table = %config.id, "restored persisted query state");
          saved.clamp_to(&defaults);
          saved
        }
        Ok(None) => defaults.clone(),
        Err(e) => {
          warn!(table = %config.id, error = %e, "ignoring unreadable persisted query state");
          defaults.clone()
        }
      }
    } else {
      defaults.clone()
    };

    storage.save_state(&state_key, &query)?;
    info!(table = %config.id, endpoint = %config.endpoint, "table constructed");

    Ok(Self {
      inner: Arc::new(Inner {
        id: config.id,
        state_key,
        endpoint: config.endpoint,
        api,
        storage,
        defaults,
        state: Mutex::new(TableState {
          query,
          ui: UiState::default(),
          indexes: HashMap::new(),
          current_fingerprint: None,
          items: Vec::new(),
          total_items: 0,
          offline: false,
        }),
        values_debounce: Debouncer::new(config.debounce),
        filters_debounce: Debouncer::new(config.debounce),
      }),
    })
  }

  fn state(&self) -> MutexGuard<'_, TableState<T>> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // --------------------------------------------------------------------------
  // Accessors
  // --------------------------------------------------------------------------

  pub fn id(&self) -> &str {
    &self.inner.id
  }

  pub fn endpoint(&self) -> &str {
    &self.inner.endpoint
  }

  pub fn query(&self) -> QueryState {
    self.state().query.clone()
  }

  pub fn defaults(&self) -> &QueryState {
    &self.inner.defaults
  }

  pub fn ui(&self) -> UiState {
    self.state().ui.clone()
  }

  /// Records of the last page served.
  pub fn current_items(&self) -> Vec<T> {
    self.state().items.clone()
  }

  pub fn total_items(&self) -> u64 {
    self.state().total_items
  }

  /// Fingerprint of the last query asked for, if any.
  pub fn current_fingerprint(&self) -> Option<String> {
    self.state().current_fingerprint.clone()
  }

  pub fn index_entry(&self, fingerprint: &str) -> Option<IndexEntry> {
    self.state().indexes.get(fingerprint).cloned()
  }

  pub fn index_len(&self) -> usize {
    self.state().indexes.len()
  }

  pub fn is_offline(&self) -> bool {
    self.state().offline
  }

  /// In offline mode index misses are paged from the local store instead of
  /// going to the server.
  pub fn set_offline(&self, offline: bool) {
    self.state().offline = offline;
    info!(table = %self.inner.id, offline, "offline mode changed");
  }

  // --------------------------------------------------------------------------
  // Loading
  // --------------------------------------------------------------------------

  /// Serve the current query, from the index when possible.
  ///
  /// Only the load for the most recently requested fingerprint updates the
  /// items and UI state. An older load still finishing returns its page to
  /// its own caller and leaves the table alone.
  pub async fn get_for_table(&self, force_from_server: bool) -> Result<TablePage<T>, TableError> {
    let (query, fp, entry, offline) = {
      let mut state = self.state();
      state.ui.begin_loading();
      let fp = fingerprint(&state.query);
      state.current_fingerprint = Some(fp.clone());
      let entry = state.indexes.get(&fp).cloned();
      (state.query.clone(), fp, entry, state.offline)
    };

    match self.load(&query, &fp, entry, offline, force_from_server).await {
      Ok(page) => Ok(self.settle(&fp, page)),
      Err(e) => Err(self.fail(Some(&fp), e)),
    }
  }

  async fn load(
    &self,
    query: &QueryState,
    fp: &str,
    entry: Option<IndexEntry>,
    offline: bool,
    force_from_server: bool,
  ) -> Result<TablePage<T>, TableError> {
    if !force_from_server {
      if let Some(entry) = entry.filter(|e| e.total_items > 0) {
        if let Some(page) = self.from_index(fp, entry)? {
          return Ok(page);
        }
      }
    }

    if offline {
      let records: Vec<T> = self.inner.storage.all_records(&self.inner.id)?;
      debug!(table = %self.inner.id, fingerprint = %fp, "paging from local store");
      return Ok(offline::paginate(records, query)?);
    }

    self.from_network(fp).await
  }

  fn from_index(&self, fp: &str, entry: IndexEntry) -> Result<Option<TablePage<T>>, TableError> {
    let records: Vec<T> = self
      .inner
      .storage
      .get_records(&self.inner.id, &entry.record_ids)?;

    if records.len() != entry.record_ids.len() {
      warn!(
        table = %self.inner.id,
        fingerprint = %fp,
        expected = entry.record_ids.len(),
        found = records.len(),
        "index entry references missing records, refetching"
      );
      self.state().indexes.remove(fp);
      return Ok(None);
    }

    debug!(table = %self.inner.id, fingerprint = %fp, "index hit");
    Ok(Some(TablePage::from_index(records, entry.total_items)))
  }

  async fn from_network(&self, fp: &str) -> Result<TablePage<T>, TableError> {
    let url = table_url(&self.inner.endpoint, fp);
    let pending = self.inner.api.get_adv(&url, RequestOptions::new()).await?;
    debug!(table = %self.inner.id, request = %pending.id, fingerprint = %fp, "fetching page");

    let response = pending.response().await?;
    let items: Vec<T> = response.json()?;
    let total_items = response
      .header(TOTAL_COUNT_HEADER)
      .and_then(|v| v.trim().parse::<u64>().ok())
      .unwrap_or(0);

    let record_ids: Vec<String> = items.iter().map(TableRecord::record_id).collect();
    let mut seen = HashSet::with_capacity(record_ids.len());
    let unique = record_ids
      .iter()
      .all(|id| !id.is_empty() && seen.insert(id.as_str()));

    if unique {
      self.inner.storage.upsert_records(&self.inner.id, &items)?;
      let entry = IndexEntry {
        record_ids,
        total_items,
      };
      self.state().indexes.insert(fp.to_string(), entry);
    } else {
      // The store is keyed by id, so this page cannot be rebuilt from it.
      warn!(
        table = %self.inner.id,
        fingerprint = %fp,
        "page has records without a unique id, not indexing it"
      );
      let keyed: Vec<T> = items
        .iter()
        .filter(|r| !r.record_id().is_empty())
        .cloned()
        .collect();
      self.inner.storage.upsert_records(&self.inner.id, &keyed)?;
    }

    Ok(TablePage::from_network(items, total_items))
  }

  fn is_current(state: &TableState<T>, fp: &str) -> bool {
    state.current_fingerprint.as_deref() == Some(fp)
  }

  fn settle(&self, fp: &str, page: TablePage<T>) -> TablePage<T> {
    let mut state = self.state();
    if !Self::is_current(&state, fp) {
      debug!(table = %self.inner.id, fingerprint = %fp, "superseded load finished, not applied");
      return page;
    }
    state.items = page.items.clone();
    state.total_items = page.total_items;
    state.ui.finish();
    page
  }

  /// Record a failure in the UI state. `fp` names the load that failed; a
  /// superseded load does not touch the UI.
  fn fail(&self, fp: Option<&str>, err: TableError) -> TableError {
    warn!(table = %self.inner.id, error = %err, "table load failed");
    let mut state = self.state();
    if fp.map_or(true, |fp| Self::is_current(&state, fp)) {
      match &err {
        TableError::Api(api) => state.ui.fail_api(api),
        other => state.ui.fail(other.to_string(), None),
      }
    }
    err
  }

  fn persist(&self, query: &QueryState) -> Result<(), TableError> {
    self
      .inner
      .storage
      .save_state(&self.inner.state_key, query)
      .map_err(|e| self.fail(None, e.into()))
  }

  // --------------------------------------------------------------------------
  // Updates
  // --------------------------------------------------------------------------

  /// Merge `options` into the query, persist it and reload.
  pub async fn update_values(&self, options: TableOptions) -> Result<TablePage<T>, TableError> {
    let query = {
      let mut state = self.state();
      state.query.apply(options);
      state.query.clone()
    };
    self.persist(&query)?;
    self.get_for_table(false).await
  }

  /// Replace the filters, go back to page 1 and reload.
  pub async fn update_filters(&self, filters: Filters) -> Result<TablePage<T>, TableError> {
    let query = {
      let mut state = self.state();
      state.query.filters = filters;
      state.query.page = DEFAULT_PAGE;
      state.total_items = 0;
      state.query.clone()
    };
    self.persist(&query)?;
    self.get_for_table(false).await
  }

  /// Debounced [`update_values`](Self::update_values). Only the last call in a
  /// burst is applied.
  pub fn update_values_debounced(&self, options: TableOptions) {
    let table = self.clone();
    self.inner.values_debounce.call(async move {
      if let Err(e) = table.update_values(options).await {
        debug!(table = %table.inner.id, error = %e, "debounced update failed");
      }
    });
  }

  /// Debounced [`update_filters`](Self::update_filters).
  pub fn update_filters_debounced(&self, filters: Filters) {
    let table = self.clone();
    self.inner.filters_debounce.call(async move {
      if let Err(e) = table.update_filters(filters).await {
        debug!(table = %table.inner.id, error = %e, "debounced filter update failed");
      }
    });
  }

  /// Drop debounced updates that have not fired yet.
  pub fn cancel_debounced(&self) {
    self.inner.values_debounce.cancel();
    self.inner.filters_debounce.cancel();
  }

  /// Restore the default query and reload.
  pub async fn reset(&self) -> Result<TablePage<T>, TableError> {
    let query = {
      let mut state = self.state();
      state.query = self.inner.defaults.clone();
      state.total_items = 0;
      state.query.clone()
    };
    self.persist(&query)?;
    self.get_for_table(false).await
  }

  /// Restore the default filters only.
  pub async fn reset_filters(&self) -> Result<TablePage<T>, TableError> {
    self.update_filters(self.inner.defaults.filters.clone()).await
  }

  /// Forget every fingerprint → ids mapping. Stored records are kept.
  pub fn reset_indexing(&self) {
    let mut state = self.state();
    state.indexes.clear();
    state.current_fingerprint = None;
    info!(table = %self.inner.id, "index cleared");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::error::ErrorCode;
  use crate::api::token::StaticToken;
  use crate::api::transport::mock::{MockReply, MockTransport};
  use crate::api::transport::{FailureKind, TransportFailure, TransportResponse};
  use crate::api::ApiConfig;
  use crate::cache::{JsonRecord, MemoryStorage, PageSource};
  use crate::table::query::{SortSpec, TableOptions};
  use crate::table::ui_state::TableStatus;
  use bytes::Bytes;
  use reqwest::header::HeaderMap;
  use reqwest::StatusCode;
  use serde_json::json;

  type Table = ServerDataTable<JsonRecord, MemoryStorage>;

  fn api(transport: Arc<MockTransport>) -> ApiService {
    ApiService::new(
      ApiConfig::new("https://api.example.com"),
      transport,
      Arc::new(StaticToken("t".into())),
    )
  }

  fn users_transport(total: &str) -> Arc<MockTransport> {
    Arc::new(MockTransport::json(
      json!([
        {"_id": "1", "name": "Alice"},
        {"_id": "2", "name": "Bob"},
        {"_id": "3", "name": "Carol"}
      ]),
      &[(TOTAL_COUNT_HEADER, total)],
    ))
  }

  fn table(transport: Arc<MockTransport>, storage: Arc<MemoryStorage>) -> Table {
    ServerDataTable::new(TableConfig::new("users", "users"), api(transport), storage).unwrap()
  }

  fn ids(page: &TablePage<JsonRecord>) -> Vec<String> {
    page.items.iter().map(|r| r.record_id()).collect()
  }

  fn page_response(body: serde_json::Value, total: &str) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "application/json".parse().unwrap());
    headers.insert(TOTAL_COUNT_HEADER, total.parse().unwrap());
    TransportResponse::new(StatusCode::OK, headers, Bytes::from(body.to_string()))
  }

  #[tokio::test]
  async fn test_repeat_query_is_served_from_index() {
    let transport = users_transport("3");
    let table = table(transport.clone(), Arc::new(MemoryStorage::new()));

    let first = table.get_for_table(false).await.unwrap();
    let second = table.get_for_table(false).await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(first.source, PageSource::Network);
    assert_eq!(second.source, PageSource::Index);
    assert_eq!(ids(&second), vec!["1", "2", "3"]);
    assert_eq!(second.total_items, 3);
    assert_eq!(table.ui().status, TableStatus::Ready);
    assert!(!table.ui().loading);
  }

  #[tokio::test]
  async fn test_reset_indexing_and_force_go_to_server() {
    let transport = users_transport("3");
    let table = table(transport.clone(), Arc::new(MemoryStorage::new()));

    table.get_for_table(false).await.unwrap();
    table.reset_indexing();
    assert_eq!(table.index_len(), 0);
    assert_eq!(table.current_fingerprint(), None);

    table.get_for_table(false).await.unwrap();
    assert_eq!(transport.calls(), 2);

    let forced = table.get_for_table(true).await.unwrap();
    assert_eq!(transport.calls(), 3);
    assert_eq!(forced.source, PageSource::Network);
  }

  #[tokio::test]
  async fn test_request_carries_fingerprint() {
    let transport = users_transport("3");
    let table = table(transport.clone(), Arc::new(MemoryStorage::new()));

    table
      .update_values(
        TableOptions::new()
          .filter("status", vec!["open", "closed"])
          .sort_by(vec![SortSpec::desc("created")])
          .page_size(50)
          .page(2),
      )
      .await
      .unwrap();

    let fp = "status[]=open&status[]=closed&sortBy[]=created|desc&limit=50&page=2";
    assert_eq!(
      transport.requests()[0].url,
      format!("https://api.example.com/users?{}", fp)
    );
    assert_eq!(table.current_fingerprint().as_deref(), Some(fp));
    assert_eq!(
      table.index_entry(fp).unwrap().record_ids,
      vec!["1", "2", "3"]
    );
  }

  #[tokio::test]
  async fn test_missing_total_is_refetched() {
    let transport = Arc::new(MockTransport::json(json!([{"_id": "1"}]), &[]));
    let table = table(transport.clone(), Arc::new(MemoryStorage::new()));

    let page = table.get_for_table(false).await.unwrap();
    assert_eq!(page.total_items, 0);

    table.get_for_table(false).await.unwrap();
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_stale_index_entry_is_refetched() {
    let transport = users_transport("3");
    let storage = Arc::new(MemoryStorage::new());
    let table = table(transport.clone(), storage.clone());

    table.get_for_table(false).await.unwrap();
    storage.delete_records("users", &["2".to_string()]).unwrap();

    let page = table.get_for_table(false).await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(page.source, PageSource::Network);
    assert_eq!(ids(&page), vec!["1", "2", "3"]);
  }

  #[tokio::test]
  async fn test_api_error_reaches_ui_and_caller() {
    let transport = Arc::new(MockTransport::new(|req| {
      MockReply::Fail(TransportFailure::new(
        FailureKind::Network,
        "connection refused",
        req.response_type,
      ))
    }));
    let table = table(transport, Arc::new(MemoryStorage::new()));

    let err = table.get_for_table(false).await.unwrap_err();

    assert!(err.api_error().unwrap().is_network());
    let ui = table.ui();
    assert_eq!(ui.status, TableStatus::Error);
    assert!(ui.loading_error.error);
    assert_eq!(
      ui.loading_error.code,
      Some(ErrorCode::Internal("1001".into()))
    );
    assert_eq!(table.index_len(), 0);
  }

  #[tokio::test]
  async fn test_bad_payload_is_decode_error() {
    let transport = Arc::new(MockTransport::json(json!({"not": "a list"}), &[]));
    let table = table(transport, Arc::new(MemoryStorage::new()));

    let err = table.get_for_table(false).await.unwrap_err();

    assert!(matches!(err, TableError::Decode(_)));
    assert_eq!(table.ui().status, TableStatus::Error);
    assert_eq!(table.ui().loading_error.code, None);
  }

  #[tokio::test]
  async fn test_filter_update_resets_page_and_persists() {
    let transport = users_transport("3");
    let storage = Arc::new(MemoryStorage::new());
    let table = table(transport, storage.clone());

    table.update_values(TableOptions::new().page(3)).await.unwrap();
    assert_eq!(table.query().page, 3);

    table
      .update_values(TableOptions::new().filter("name", "a"))
      .await
      .unwrap();

    assert_eq!(table.query().page, 1);
    let saved: QueryState = storage.load_state("USERS").unwrap().unwrap();
    assert_eq!(saved, table.query());
  }

  #[tokio::test]
  async fn test_update_filters_returns_to_first_page() {
    let transport = users_transport("3");
    let table = table(transport, Arc::new(MemoryStorage::new()));
    table.update_values(TableOptions::new().page(2)).await.unwrap();

    let mut filters = Filters::new();
    filters.insert("name".into(), Some("b".into()));
    let page = table.update_filters(filters).await.unwrap();

    assert_eq!(table.query().page, 1);
    assert_eq!(page.total_items, 3);
    assert_eq!(table.total_items(), 3);
  }

  #[tokio::test]
  async fn test_persisted_state_is_restored() {
    let storage = Arc::new(MemoryStorage::new());
    let saved = QueryState::from_options(&TableOptions::new().page(4).filter("team", "core"));
    storage.save_state("USERS", &saved).unwrap();

    let restored = table(users_transport("3"), storage.clone());
    assert_eq!(restored.query(), saved);

    let fresh: Table = ServerDataTable::new(
      TableConfig::new("users", "users")
        .with_defaults(TableOptions::new().page_size(20))
        .load_from_storage(false),
      api(users_transport("3")),
      storage.clone(),
    )
    .unwrap();
    assert_eq!(fresh.query().page, 1);
    assert_eq!(fresh.query().page_size, 20);
    // Construction persists the state it starts from
    let saved: QueryState = storage.load_state("USERS").unwrap().unwrap();
    assert_eq!(saved.page_size, 20);
  }

  #[tokio::test]
  async fn test_zero_paging_in_persisted_state_is_clamped() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .save_state("USERS", &json!({"page": 0, "page_size": 0}))
      .unwrap();
    let transport = users_transport("3");

    let table = table(transport.clone(), storage);
    table.get_for_table(false).await.unwrap();

    assert_eq!(table.query().page, 1);
    assert_eq!(table.query().page_size, 100);
    assert!(transport.requests()[0].url.ends_with("limit=100&page=1"));
  }

  #[tokio::test]
  async fn test_records_without_unique_ids_are_not_indexed() {
    let transport = Arc::new(MockTransport::json(
      json!([{"name": "Alice"}, {"name": "Bob"}]),
      &[(TOTAL_COUNT_HEADER, "2")],
    ));
    let storage = Arc::new(MemoryStorage::new());
    let table = table(transport.clone(), storage.clone());

    let first = table.get_for_table(false).await.unwrap();
    let second = table.get_for_table(false).await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(second.source, PageSource::Network);
    assert_eq!(first.items, second.items);
    assert_eq!(second.items[1].0["name"], "Bob");
    assert_eq!(table.index_len(), 0);
    let stored: Vec<JsonRecord> = storage.all_records("users").unwrap();
    assert!(stored.is_empty());
  }

  #[tokio::test]
  async fn test_superseded_load_does_not_overwrite_newer_page() {
    let transport = Arc::new(MockTransport::new(|request| {
      if request.url.contains("page=1") {
        MockReply::Delayed(
          Duration::from_millis(80),
          page_response(json!([{"_id": "old"}]), "2"),
        )
      } else {
        MockReply::Respond(page_response(json!([{"_id": "new"}]), "2"))
      }
    }));
    let table = table(transport, Arc::new(MemoryStorage::new()));

    let slow = table.clone();
    let first = tokio::spawn(async move { slow.get_for_table(false).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    table
      .update_values(TableOptions::new().page(2))
      .await
      .unwrap();
    let stale = first.await.unwrap().unwrap();

    assert_eq!(ids(&stale), vec!["old"]);
    let current: Vec<String> = table.current_items().iter().map(|r| r.record_id()).collect();
    assert_eq!(current, vec!["new"]);
    assert_eq!(table.current_fingerprint().as_deref(), Some("limit=100&page=2"));
    assert_eq!(table.ui().status, TableStatus::Ready);
  }

  #[tokio::test]
  async fn test_reset_restores_defaults() {
    let transport = users_transport("3");
    let table: Table = ServerDataTable::new(
      TableConfig::new("users", "users")
        .with_defaults(TableOptions::new().filter("status", "open").page_size(10)),
      api(transport),
      Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    table
      .update_values(TableOptions::new().filter("status", "closed").page(5).page_size(50))
      .await
      .unwrap();
    table.reset_filters().await.unwrap();
    assert_eq!(table.query().filters, table.defaults().filters);
    assert_eq!(table.query().page_size, 50);

    table.reset().await.unwrap();
    assert_eq!(&table.query(), table.defaults());
  }

  #[tokio::test]
  async fn test_debounced_updates_coalesce() {
    let transport = users_transport("3");
    let table: Table = ServerDataTable::new(
      TableConfig::new("users", "users").with_debounce(Duration::from_millis(20)),
      api(transport.clone()),
      Arc::new(MemoryStorage::new()),
    )
    .unwrap();

    for page in 2..=4 {
      table.update_values_debounced(TableOptions::new().page(page));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(transport.calls(), 1);
    assert_eq!(table.query().page, 4);
  }

  #[tokio::test]
  async fn test_offline_pages_from_store() {
    let transport = users_transport("3");
    let table = table(transport.clone(), Arc::new(MemoryStorage::new()));
    table.get_for_table(false).await.unwrap();

    table.set_offline(true);
    let page = table
      .update_values(TableOptions::new().page_size(2).page(2))
      .await
      .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(page.source, PageSource::Offline);
    assert_eq!(ids(&page), vec!["3"]);
    assert_eq!(page.total_items, 3);
  }
}
