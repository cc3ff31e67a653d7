//! Paging over locally stored records when the server is unreachable.
//!
//! Filters are AND'ed across keys; a list value matches if any element does.
//! A value matches when the record field, rendered as text, starts with it
//! (case-insensitive). Only the first sort spec is applied.

use std::cmp::Ordering;

use serde_json::Value;

use super::query::{QueryState, SortDirection};
use crate::cache::{TablePage, TableRecord};

pub fn paginate<T: TableRecord>(records: Vec<T>, query: &QueryState) -> serde_json::Result<TablePage<T>> {
  let mut rows: Vec<(Value, T)> = Vec::with_capacity(records.len());
  for record in records {
    let value = serde_json::to_value(&record)?;
    if matches(&value, query) {
      rows.push((value, record));
    }
  }

  if let Some(spec) = query.sort_by.first() {
    rows.sort_by(|(a, _), (b, _)| {
      let ordering = compare(a.get(&spec.key), b.get(&spec.key));
      match spec.order {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
      }
    });
  }

  let total = rows.len() as u64;
  let page_size = query.page_size.max(1) as usize;
  let skip = (query.page.max(1) as usize - 1).saturating_mul(page_size);
  let items = rows
    .into_iter()
    .skip(skip)
    .take(page_size)
    .map(|(_, record)| record)
    .collect();

  Ok(TablePage::offline(items, total))
}

fn matches(record: &Value, query: &QueryState) -> bool {
  query.filters.iter().all(|(key, filter)| {
    let Some(filter) = filter else {
      return true;
    };
    let wanted = filter.effective_values();
    if wanted.is_empty() {
      return true;
    }
    let Some(field) = record.get(key).and_then(as_text) else {
      return false;
    };
    let field = field.to_lowercase();
    wanted
      .iter()
      .any(|w| field.starts_with(&w.to_lowercase()))
  })
}

fn as_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Missing and null sort first, then booleans, numbers, strings.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  fn rank(value: Option<&Value>) -> u8 {
    match value {
      None | Some(Value::Null) => 0,
      Some(Value::Bool(_)) => 1,
      Some(Value::Number(_)) => 2,
      Some(Value::String(_)) => 3,
      Some(_) => 4,
    }
  }

  match (a, b) {
    (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
    (Some(Value::Number(x)), Some(Value::Number(y))) => {
      let x = x.as_f64().unwrap_or(0.0);
      let y = y.as_f64().unwrap_or(0.0);
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
    _ => rank(a).cmp(&rank(b)),
  }
}
