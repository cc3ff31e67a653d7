use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::api::{ApiConfig, EnvToken};
use crate::db;
use crate::table::{Filters, SortSpec, TableConfig, TableOptions};

/// Environment variable checked for the bearer token when `token_env` is unset
/// or empty.
pub const DEFAULT_TOKEN_ENV: &str = "APIDESK_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiSection,
  #[serde(default)]
  pub cache: CacheSection,
  /// Named table views, e.g. `users: { path: users, page_size: 50 }`
  #[serde(default)]
  pub tables: BTreeMap<String, TableSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
  pub base_url: String,
  /// Query string appended to every request, e.g. `tenant=7`
  #[serde(default)]
  pub base_url_params: String,
  #[serde(default = "default_true")]
  pub use_authentication: bool,
  /// Environment variable holding the bearer token
  pub token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
  /// Database path (defaults to the user data directory)
  pub path: Option<PathBuf>,
  /// Keep records and table state across runs
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for CacheSection {
  fn default() -> Self {
    Self {
      path: None,
      persist: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSection {
  /// Endpoint path relative to `api.base_url`
  pub path: String,
  pub page_size: Option<u32>,
  #[serde(default)]
  pub sort_by: Vec<SortSpec>,
  #[serde(default)]
  pub group_by: Vec<SortSpec>,
  #[serde(default)]
  pub filters: Filters,
}

fn default_true() -> bool {
  true
}

impl TableSection {
  pub fn options(&self) -> TableOptions {
    TableOptions {
      filters: (!self.filters.is_empty()).then(|| self.filters.clone()),
      page: None,
      page_size: self.page_size,
      sort_by: (!self.sort_by.is_empty()).then(|| self.sort_by.clone()),
      group_by: (!self.group_by.is_empty()).then(|| self.group_by.clone()),
    }
  }
}

/// Project-local config file, looked up in the working directory.
pub const LOCAL_CONFIG: &str = "apidesk.yaml";

/// Places a config file is looked for when none is given, highest priority
/// first.
pub fn candidate_paths() -> Vec<PathBuf> {
  let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
  if let Some(config_dir) = dirs::config_dir() {
    paths.push(config_dir.join("apidesk").join("config.yaml"));
  }
  paths
}

impl Config {
  /// Read the config at `explicit_path`, or the first of [`candidate_paths`]
  /// that exists. An explicit path that does not exist is an error; it never
  /// falls back to the search.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    if let Some(path) = explicit_path {
      if !path.exists() {
        return Err(eyre!("Config file not found: {}", path.display()));
      }
      return Self::load_from_path(path);
    }

    let candidates = candidate_paths();
    match candidates.iter().find(|p| p.exists()) {
      Some(path) => Self::load_from_path(path),
      None => {
        let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(eyre!(
          "No apidesk config found (looked in {}). See config.example.yaml for the format.",
          searched.join(", ")
        ))
      }
    }
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  pub fn api_config(&self) -> ApiConfig {
    ApiConfig::new(self.api.base_url.clone())
      .with_params(self.api.base_url_params.clone())
      .with_authentication(self.api.use_authentication)
  }

  /// Token source: `token_env` first, then `APIDESK_TOKEN`.
  ///
  /// A missing token is not an error here; authenticated calls fail with an
  /// auth error instead.
  pub fn token_provider(&self) -> EnvToken {
    let mut vars: Vec<String> = Vec::new();
    if let Some(var) = self.api.token_env.as_deref().filter(|v| !v.is_empty()) {
      vars.push(var.to_string());
    }
    vars.push(DEFAULT_TOKEN_ENV.to_string());
    EnvToken::new(vars)
  }

  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(path) => Ok(path.clone()),
      None => db::default_path(),
    }
  }

  pub fn table(&self, name: &str) -> Result<TableConfig> {
    let section = self.tables.get(name).ok_or_else(|| {
      let known: Vec<&str> = self.tables.keys().map(String::as_str).collect();
      eyre!(
        "Unknown table '{}'. Configured tables: {}",
        name,
        if known.is_empty() {
          "(none)".to_string()
        } else {
          known.join(", ")
        }
      )
    })?;

    Ok(TableConfig::new(name, section.path.clone()).with_defaults(section.options()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::table::{FilterValue, SortDirection};

  const SAMPLE: &str = r#"
api:
  base_url: https://api.example.com
  base_url_params: tenant=7
  token_env: MY_TOKEN
cache:
  path: /tmp/apidesk-test.db
tables:
  users:
    path: v1/users
    page_size: 50
    sort_by:
      - key: created
        order: desc
    filters:
      status: [open, closed]
      owner: ~
"#;

  #[test]
  fn test_parse_full_config() {
    let config = Config::from_yaml(SAMPLE).unwrap();

    let api = config.api_config();
    assert_eq!(api.base_url, "https://api.example.com");
    assert_eq!(api.base_url_params, "tenant=7");
    assert!(api.use_authentication);
    assert_eq!(
      config.cache_path().unwrap(),
      PathBuf::from("/tmp/apidesk-test.db")
    );
    assert!(config.cache.persist);

    let table = config.table("users").unwrap();
    assert_eq!(table.id, "users");
    assert_eq!(table.endpoint, "v1/users");
    assert_eq!(table.defaults.page_size, Some(50));
    let sort = table.defaults.sort_by.unwrap();
    assert_eq!(sort[0].order, SortDirection::Desc);
    let filters = table.defaults.filters.unwrap();
    assert_eq!(
      filters["status"],
      Some(FilterValue::Many(vec![Some("open".into()), Some("closed".into())]))
    );
    assert_eq!(filters["owner"], None);
  }

  #[test]
  fn test_minimal_config_defaults() {
    let config = Config::from_yaml("api:\n  base_url: http://localhost:8080\n").unwrap();

    assert!(config.api.use_authentication);
    assert!(config.api.base_url_params.is_empty());
    assert!(config.tables.is_empty());
    assert!(config.cache.path.is_none());
    assert!(config.cache.persist);
  }

  #[test]
  fn test_unknown_table_lists_known_ones() {
    let config = Config::from_yaml(SAMPLE).unwrap();

    let err = config.table("teams").unwrap_err().to_string();

    assert!(err.contains("teams"));
    assert!(err.contains("users"));
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/apidesk.yaml"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
  }

  #[test]
  fn test_local_file_is_searched_first() {
    let paths = candidate_paths();

    assert_eq!(paths[0], PathBuf::from(LOCAL_CONFIG));
    if let Some(last) = paths.get(1) {
      assert!(last.ends_with("apidesk/config.yaml"));
    }
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, SAMPLE).unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.tables["users"].path, "v1/users");
  }
}
