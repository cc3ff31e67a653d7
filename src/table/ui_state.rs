//! Loading/error snapshot a view can render from.

use crate::api::{ApiError, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStatus {
  #[default]
  Idle,
  Loading,
  Ready,
  Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiError {
  pub error: bool,
  pub code: Option<ErrorCode>,
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
  pub status: TableStatus,
  pub loading: bool,
  pub loading_error: UiError,
}

impl UiState {
  pub(crate) fn begin_loading(&mut self) {
    self.status = TableStatus::Loading;
    self.loading = true;
    self.loading_error = UiError::default();
  }

  pub(crate) fn finish(&mut self) {
    self.status = TableStatus::Ready;
    self.loading = false;
  }

  pub(crate) fn fail(&mut self, message: impl Into<String>, code: Option<ErrorCode>) {
    self.status = TableStatus::Error;
    self.loading = false;
    self.loading_error = UiError {
      error: true,
      code,
      message: message.into(),
    };
  }

  pub(crate) fn fail_api(&mut self, err: &ApiError) {
    self.fail(err.message(), Some(err.code().clone()));
  }

  pub fn is_error(&self) -> bool {
    self.loading_error.error
  }
}
