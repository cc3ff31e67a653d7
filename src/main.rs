use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use apidesk::api::{ApiService, DirectorySink, ReqwestTransport, RequestOptions, UploadFile};
use apidesk::cache::{CacheStorage, JsonRecord, MemoryStorage, SqliteStorage};
use apidesk::config::Config;
use apidesk::logging;
use apidesk::table::{
  FilterValue, Filters, ServerDataTable, SortDirection, SortSpec, TableConfig, TableOptions,
};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "apidesk")]
#[command(about = "Authenticated API client with a locally cached table browser")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./apidesk.yaml, then $XDG_CONFIG_HOME/apidesk/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print one page of a configured table as JSON
  Table {
    /// Table name from the `tables` section
    name: String,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    page_size: Option<u32>,
    /// Filter as KEY=VALUE; repeat a key to match any of several values
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    filters: Vec<String>,
    /// Sort as KEY or KEY:asc / KEY:desc
    #[arg(long = "sort", value_name = "KEY[:DIR]")]
    sorts: Vec<String>,
    /// Start from the configured defaults instead of the saved state
    #[arg(long)]
    reset: bool,
    /// Page through locally cached records without calling the server
    #[arg(long)]
    offline: bool,
  },
  /// GET a path and print the response body
  Get {
    path: String,
    #[arg(long)]
    no_auth: bool,
  },
  /// Download a file into a directory
  Download {
    path: String,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    no_auth: bool,
  },
  /// Upload files as a multipart form
  Upload {
    path: String,
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(long)]
    no_auth: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(&logging::default_dir()?)?;

  let config = Config::load(args.config.as_deref())?;
  let api = ApiService::new(
    config.api_config(),
    Arc::new(ReqwestTransport::new()?),
    Arc::new(config.token_provider()),
  );

  match args.command {
    Command::Table {
      name,
      page,
      page_size,
      filters,
      sorts,
      reset,
      offline,
    } => {
      let table_config = config.table(&name)?.load_from_storage(!reset);
      let mut options = TableOptions {
        page,
        page_size,
        ..TableOptions::default()
      };
      if !filters.is_empty() {
        options.filters = Some(parse_filters(&filters)?);
      }
      if !sorts.is_empty() {
        options.sort_by = Some(sorts.iter().map(|s| parse_sort(s)).collect::<Result<_>>()?);
      }

      if config.cache.persist {
        let storage = Arc::new(SqliteStorage::open(&config.cache_path()?)?);
        show_table(table_config, api, storage, options, offline).await?;
      } else {
        let storage = Arc::new(MemoryStorage::new());
        show_table(table_config, api, storage, options, offline).await?;
      }
    }
    Command::Get { path, no_auth } => {
      let response = api.get(&path, request_options(no_auth)).await?;
      println!("{}", response.text());
    }
    Command::Download { path, out, no_auth } => {
      let sink = DirectorySink::new(out);
      let file_name = api
        .get_download(&path, request_options(no_auth), &sink)
        .await?;
      println!("{}", sink.target(&file_name).display());
    }
    Command::Upload {
      path,
      files,
      no_auth,
    } => {
      let mut uploads = Vec::with_capacity(files.len());
      for file in &files {
        let content = tokio::fs::read(file)
          .await
          .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
        let name = file
          .file_name()
          .and_then(|n| n.to_str())
          .unwrap_or("file")
          .to_string();
        uploads.push(UploadFile::new(name, content));
      }
      let response = api.upload(&path, uploads, request_options(no_auth)).await?;
      println!("{}", response.text());
    }
  }

  Ok(())
}

async fn show_table<S: CacheStorage>(
  config: TableConfig,
  api: ApiService,
  storage: Arc<S>,
  options: TableOptions,
  offline: bool,
) -> Result<()> {
  let table: ServerDataTable<JsonRecord, S> = ServerDataTable::new(config, api, storage)?;
  table.set_offline(offline);

  let page = if options == TableOptions::default() {
    table.get_for_table(false).await?
  } else {
    table.update_values(options).await?
  };

  let query = table.query();
  let output = json!({
    "table": table.id(),
    "page": query.page,
    "page_size": query.page_size,
    "total_items": page.total_items,
    "source": format!("{:?}", page.source).to_lowercase(),
    "items": page.items,
  });
  let rendered =
    serde_json::to_string_pretty(&output).map_err(|e| eyre!("Failed to render page: {}", e))?;
  println!("{}", rendered);

  Ok(())
}

fn request_options(no_auth: bool) -> RequestOptions {
  if no_auth {
    RequestOptions::without_auth()
  } else {
    RequestOptions::new()
  }
}

/// `KEY=VALUE` pairs; a key given more than once becomes a list filter.
fn parse_filters(raw: &[String]) -> Result<Filters> {
  let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for item in raw {
    let (key, value) = item
      .split_once('=')
      .ok_or_else(|| eyre!("Invalid filter '{}', expected KEY=VALUE", item))?;
    grouped
      .entry(key.trim().to_string())
      .or_default()
      .push(value.to_string());
  }

  Ok(
    grouped
      .into_iter()
      .map(|(key, mut values)| {
        let value = if values.len() == 1 {
          FilterValue::One(values.remove(0))
        } else {
          FilterValue::Many(values.into_iter().map(Some).collect())
        };
        (key, Some(value))
      })
      .collect(),
  )
}

fn parse_sort(raw: &str) -> Result<SortSpec> {
  let (key, dir) = raw.split_once(':').unwrap_or((raw, "asc"));
  let order = match dir.to_lowercase().as_str() {
    "asc" => SortDirection::Asc,
    "desc" => SortDirection::Desc,
    other => return Err(eyre!("Invalid sort direction '{}' in '{}'", other, raw)),
  };
  Ok(SortSpec {
    key: key.to_string(),
    order,
  })
}
