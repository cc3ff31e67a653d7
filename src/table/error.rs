use thiserror::Error;

use crate::api::ApiError;

/// Failure of a table operation.
#[derive(Debug, Error)]
pub enum TableError {
  /// The API call failed; the error is passed through unchanged.
  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("local store: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync + 'static>),

  #[error("failed to decode table response: {0}")]
  Decode(#[from] serde_json::Error),
}

impl TableError {
  pub fn api_error(&self) -> Option<&ApiError> {
    match self {
      TableError::Api(err) => Some(err),
      _ => None,
    }
  }
}

impl From<color_eyre::Report> for TableError {
  fn from(report: color_eyre::Report) -> Self {
    TableError::Store(report.into())
  }
}
