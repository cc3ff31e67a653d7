//! Structured error returned by every API call.
//!
//! Raw transport failures are classified into a single [`ApiError`] with an
//! [`ErrorKind`] discriminant. Classification precedence:
//!
//! 1. connectivity fault → `Network`
//! 2. client-initiated abort → `Cancelled`
//! 3. JSON body with a `message` field → `Http` carrying that message and body
//! 4. any response status → `Http` with the generic transport message
//! 5. binary responses declared as JSON are decoded and checked as in 3
//! 6. anything else → `Unrecoverable`

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::transport::{FailureKind, ResponseType, TransportFailure};

pub const NETWORK_CODE: &str = "1001";
pub const CANCELLED_CODE: &str = "1000";

const NETWORK_MESSAGE: &str = "Network connection problem";
const CANCELLED_MESSAGE: &str = "Request cancelled";
const AUTH_MESSAGE: &str = "Authentication failed";
const UNRECOVERABLE_MESSAGE: &str = "Unrecoverable error in local API service";

/// Category of an API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Missing or empty bearer token; raised before any network call
  Auth,
  /// Connectivity or DNS-level fault
  Network,
  /// Aborted by the caller
  Cancelled,
  /// Server answered with a non-success status
  Http,
  /// Anything that could not be classified
  Unrecoverable,
}

/// Status or internal code attached to an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorCode {
  #[default]
  None,
  /// HTTP status code
  Status(u16),
  /// Internal code such as [`NETWORK_CODE`]
  Internal(String),
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorCode::None => Ok(()),
      ErrorCode::Status(status) => write!(f, "{}", status),
      ErrorCode::Internal(code) => write!(f, "{}", code),
    }
  }
}

/// Immutable, classified API failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
  kind: ErrorKind,
  message: String,
  code: ErrorCode,
  payload: Value,
  correlation_id: String,
}

impl ApiError {
  pub fn new(
    kind: ErrorKind,
    message: impl Into<String>,
    code: ErrorCode,
    payload: Value,
    correlation_id: impl Into<String>,
  ) -> Self {
    Self {
      kind,
      message: message.into(),
      code,
      payload,
      correlation_id: correlation_id.into(),
    }
  }

  pub fn auth(correlation_id: impl Into<String>) -> Self {
    Self::new(
      ErrorKind::Auth,
      AUTH_MESSAGE,
      ErrorCode::Status(401),
      Value::Null,
      correlation_id,
    )
  }

  pub fn network(correlation_id: impl Into<String>) -> Self {
    Self::new(
      ErrorKind::Network,
      NETWORK_MESSAGE,
      ErrorCode::Internal(NETWORK_CODE.to_string()),
      Value::Null,
      correlation_id,
    )
  }

  pub fn cancelled(correlation_id: impl Into<String>) -> Self {
    Self::new(
      ErrorKind::Cancelled,
      CANCELLED_MESSAGE,
      ErrorCode::Internal(CANCELLED_CODE.to_string()),
      Value::Null,
      correlation_id,
    )
  }

  /// Catch-all error. `detail` is kept in the payload, never in the message.
  pub fn unrecoverable(correlation_id: impl Into<String>, detail: Option<&str>) -> Self {
    let payload = detail
      .map(|d| serde_json::json!({ "detail": d }))
      .unwrap_or(Value::Null);
    Self::new(
      ErrorKind::Unrecoverable,
      UNRECOVERABLE_MESSAGE,
      ErrorCode::None,
      payload,
      correlation_id,
    )
  }

  /// Classify a raw transport failure.
  pub fn classify(failure: &TransportFailure, correlation_id: &str) -> Self {
    match failure.kind {
      FailureKind::Network => return Self::network(correlation_id),
      FailureKind::Cancelled => return Self::cancelled(correlation_id),
      FailureKind::Other => {}
    }

    let Some(response) = failure.response.as_ref() else {
      return Self::unrecoverable(correlation_id, Some(&failure.message));
    };
    let status = response.status().as_u16();

    // Binary bodies are only inspected when they declare a JSON content type.
    let inspect_body = match failure.response_type {
      ResponseType::Json => true,
      ResponseType::Binary => response.is_json(),
    };

    if inspect_body {
      if let Some((message, body)) = message_from_body(response.body()) {
        return Self::new(
          ErrorKind::Http,
          message,
          ErrorCode::Status(status),
          body,
          correlation_id,
        );
      }
    }

    Self::new(
      ErrorKind::Http,
      failure.message.clone(),
      ErrorCode::Status(status),
      Value::Null,
      correlation_id,
    )
  }

  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn code(&self) -> &ErrorCode {
    &self.code
  }

  /// Decoded server body for `Http` errors, `Value::Null` otherwise.
  pub fn payload(&self) -> &Value {
    &self.payload
  }

  /// The `X-Request-Id` of the request that failed.
  pub fn correlation_id(&self) -> &str {
    &self.correlation_id
  }

  /// HTTP status code if the server responded
  pub fn status(&self) -> Option<u16> {
    match self.code {
      ErrorCode::Status(status) if self.kind == ErrorKind::Http => Some(status),
      _ => None,
    }
  }

  pub fn is_auth(&self) -> bool {
    self.kind == ErrorKind::Auth
  }

  pub fn is_cancelled(&self) -> bool {
    self.kind == ErrorKind::Cancelled
  }

  pub fn is_network(&self) -> bool {
    self.kind == ErrorKind::Network
  }
}

/// Extract a non-empty `message` string from a JSON object body.
fn message_from_body(body: &[u8]) -> Option<(String, Value)> {
  let value: Value = serde_json::from_slice(body).ok()?;
  let message = value.get("message")?.as_str()?;
  if message.is_empty() {
    return None;
  }
  Some((message.to_string(), value))
}
