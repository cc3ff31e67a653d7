//! Canonical query string for table state.
//!
//! The same string is the in-memory index key and the wire query string, so it
//! must be a pure function of [`QueryState`]. Order:
//!
//! 1. filters, keys in lexicographic order; list values as `key[]=v` per element
//! 2. `groupBy[]=key|dir` in given order
//! 3. `sortBy[]=key|dir` in given order
//! 4. `limit=<page_size>&page=<page>`
//!
//! Null filters, empty strings and empty lists are skipped. Keys and values are
//! form-urlencoded so that a value containing `&` or `=` cannot collide with a
//! different filter set.

use url::form_urlencoded::byte_serialize;

use super::query::{FilterValue, QueryState, SortSpec};

pub fn fingerprint(state: &QueryState) -> String {
  let mut parts: Vec<String> = Vec::new();

  for (key, value) in &state.filters {
    let Some(value) = value else {
      continue;
    };
    let key = encode(key);
    match value {
      FilterValue::One(_) => {
        for v in value.effective_values() {
          parts.push(format!("{}={}", key, encode(v)));
        }
      }
      FilterValue::Many(_) => {
        for v in value.effective_values() {
          parts.push(format!("{}[]={}", key, encode(v)));
        }
      }
    }
  }

  push_specs(&mut parts, "groupBy", &state.group_by);
  push_specs(&mut parts, "sortBy", &state.sort_by);

  parts.push(format!("limit={}", state.page_size));
  parts.push(format!("page={}", state.page));

  parts.join("&")
}

/// Request path for a table endpoint with the fingerprint as its query.
pub fn table_url(endpoint: &str, fingerprint: &str) -> String {
  let join = if endpoint.contains('?') { '&' } else { '?' };
  format!("{}{}{}", endpoint, join, fingerprint)
}

fn push_specs(parts: &mut Vec<String>, name: &str, specs: &[SortSpec]) {
  for spec in specs {
    parts.push(format!(
      "{}[]={}|{}",
      name,
      encode(&spec.key),
      spec.order.as_str()
    ));
  }
}

fn encode(s: &str) -> String {
  byte_serialize(s.as_bytes()).collect()
}
