use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::AbortHandle;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transport::RequestBody;

/// Identity of one outstanding request. Also sent as the `X-Request-Id` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
  pub fn generate() -> Self {
    Self(Uuid::new_v4().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RequestId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for RequestId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

/// In-memory record of a request that has not settled yet.
#[derive(Debug, Clone)]
pub struct RequestTicket {
  pub id: RequestId,
  pub created_at: DateTime<Utc>,
  pub url: String,
  pub body: Option<RequestBody>,
  pub requires_auth: bool,
  abort: AbortHandle,
}

impl RequestTicket {
  pub(crate) fn new(
    url: String,
    body: Option<RequestBody>,
    requires_auth: bool,
    abort: AbortHandle,
  ) -> Self {
    Self {
      id: RequestId::generate(),
      created_at: Utc::now(),
      url,
      body,
      requires_auth,
      abort,
    }
  }

  /// Signal the in-flight transport call to stop.
  pub(crate) fn abort(&self) {
    self.abort.abort();
  }

  pub fn is_aborted(&self) -> bool {
    self.abort.is_aborted()
  }
}
