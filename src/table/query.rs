//! Table query parameters: filters, sort/group specs and pagination.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

impl SortDirection {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortDirection::Asc => "asc",
      SortDirection::Desc => "desc",
    }
  }
}

/// One sort or group criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
  pub key: String,
  #[serde(default)]
  pub order: SortDirection,
}

impl SortSpec {
  pub fn asc(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      order: SortDirection::Asc,
    }
  }

  pub fn desc(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      order: SortDirection::Desc,
    }
  }
}

/// A filter is either a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
  Many(Vec<Option<String>>),
  One(String),
}

impl FilterValue {
  /// Values that take part in matching: non-null and non-empty.
  pub fn effective_values(&self) -> Vec<&str> {
    match self {
      FilterValue::One(value) => {
        if value.is_empty() {
          Vec::new()
        } else {
          vec![value.as_str()]
        }
      }
      FilterValue::Many(values) => values
        .iter()
        .flatten()
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .collect(),
    }
  }
}

impl From<&str> for FilterValue {
  fn from(value: &str) -> Self {
    FilterValue::One(value.to_string())
  }
}

impl From<String> for FilterValue {
  fn from(value: String) -> Self {
    FilterValue::One(value)
  }
}

impl From<Vec<&str>> for FilterValue {
  fn from(values: Vec<&str>) -> Self {
    FilterValue::Many(values.into_iter().map(|v| Some(v.to_string())).collect())
  }
}

/// Field → value. Keys iterate in lexicographic order; `None` means "no filter".
pub type Filters = BTreeMap<String, Option<FilterValue>>;

/// Current viewing parameters of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryState {
  #[serde(default)]
  pub filters: Filters,
  #[serde(default)]
  pub sort_by: Vec<SortSpec>,
  #[serde(default)]
  pub group_by: Vec<SortSpec>,
  #[serde(default = "default_page")]
  pub page: u32,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

fn default_page() -> u32 {
  DEFAULT_PAGE
}

fn default_page_size() -> u32 {
  DEFAULT_PAGE_SIZE
}

impl Default for QueryState {
  fn default() -> Self {
    Self {
      filters: Filters::new(),
      sort_by: Vec::new(),
      group_by: Vec::new(),
      page: DEFAULT_PAGE,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

impl QueryState {
  /// Defaults overlaid with whatever `options` sets.
  pub fn from_options(options: &TableOptions) -> Self {
    let mut state = Self::default();
    state.overlay(options.clone());
    state
  }

  /// Apply a partial update. Changing filters sends the table back to page 1
  /// unless the same update also picks a page.
  pub fn apply(&mut self, options: TableOptions) {
    let filters_changed = options
      .filters
      .as_ref()
      .is_some_and(|filters| *filters != self.filters);
    let page_given = options.page.is_some_and(|p| p > 0);

    self.overlay(options);

    if filters_changed && !page_given {
      self.page = DEFAULT_PAGE;
    }
  }

  /// Replace a zero page with the first page and a zero page size with the
  /// one from `defaults`. Used on state read back from storage.
  pub fn clamp_to(&mut self, defaults: &QueryState) {
    if self.page == 0 {
      self.page = DEFAULT_PAGE;
    }
    if self.page_size == 0 {
      self.page_size = defaults.page_size.max(1);
    }
  }

  fn overlay(&mut self, options: TableOptions) {
    if let Some(page_size) = options.page_size.filter(|n| *n > 0) {
      self.page_size = page_size;
    }
    if let Some(page) = options.page.filter(|n| *n > 0) {
      self.page = page;
    }
    if let Some(filters) = options.filters {
      self.filters = filters;
    }
    if let Some(sort_by) = options.sort_by {
      self.sort_by = sort_by;
    }
    if let Some(group_by) = options.group_by {
      self.group_by = group_by;
    }
  }
}

/// Partial set of table parameters, used for defaults and for updates.
/// Only fields that are `Some` take effect; zero page numbers are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
  #[serde(default)]
  pub filters: Option<Filters>,
  #[serde(default)]
  pub page: Option<u32>,
  #[serde(default)]
  pub page_size: Option<u32>,
  #[serde(default)]
  pub sort_by: Option<Vec<SortSpec>>,
  #[serde(default)]
  pub group_by: Option<Vec<SortSpec>>,
}

impl TableOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn filters(mut self, filters: Filters) -> Self {
    self.filters = Some(filters);
    self
  }

  pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
    self
      .filters
      .get_or_insert_with(Filters::new)
      .insert(key.into(), Some(value.into()));
    self
  }

  pub fn page(mut self, page: u32) -> Self {
    self.page = Some(page);
    self
  }

  pub fn page_size(mut self, page_size: u32) -> Self {
    self.page_size = Some(page_size);
    self
  }

  pub fn sort_by(mut self, specs: Vec<SortSpec>) -> Self {
    self.sort_by = Some(specs);
    self
  }

  pub fn group_by(mut self, specs: Vec<SortSpec>) -> Self {
    self.group_by = Some(specs);
    self
  }
}
