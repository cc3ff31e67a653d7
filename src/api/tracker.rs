//! Table of outstanding requests.
//!
//! Each service instance owns one tracker. Tickets are added on register and
//! removed exactly once, either when the transport call settles or when the
//! request is cancelled. Access is serialized through a mutex since settlement
//! happens on whatever task drives the transport future.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{AbortHandle, AbortRegistration};
use tracing::debug;

use super::ticket::{RequestId, RequestTicket};
use super::transport::RequestBody;

#[derive(Clone, Default)]
pub struct RequestTracker {
  tickets: Arc<Mutex<HashMap<RequestId, RequestTicket>>>,
}

impl RequestTracker {
  pub fn new() -> Self {
    Self::default()
  }

  fn table(&self) -> MutexGuard<'_, HashMap<RequestId, RequestTicket>> {
    // The map stays consistent even if a holder panicked, so keep using it.
    self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Track a new request. The returned registration must wrap the transport
  /// future so that cancelling the ticket aborts it.
  pub fn register(
    &self,
    url: impl Into<String>,
    body: Option<RequestBody>,
    requires_auth: bool,
  ) -> (RequestTicket, AbortRegistration) {
    let (handle, registration) = AbortHandle::new_pair();
    let ticket = RequestTicket::new(url.into(), body, requires_auth, handle);

    let mut table = self.table();
    debug!(id = %ticket.id, url = %ticket.url, outstanding = table.len() + 1, "request registered");
    table.insert(ticket.id.clone(), ticket.clone());

    (ticket, registration)
  }

  /// Drop a settled request. Returns whether it was still tracked.
  pub fn complete(&self, id: &RequestId) -> bool {
    let removed = self.table().remove(id).is_some();
    if removed {
      debug!(%id, "request completed");
    }
    removed
  }

  /// Abort and forget the given requests. Unknown ids are ignored.
  pub fn cancel(&self, ids: &[RequestId]) -> usize {
    let mut table = self.table();
    let mut cancelled = 0;
    for id in ids {
      if let Some(ticket) = table.get(id) {
        ticket.abort();
        table.remove(id);
        cancelled += 1;
        debug!(%id, "request cancelled");
      }
    }
    cancelled
  }

  pub fn cancel_all(&self) -> usize {
    let ids = self.ids();
    self.cancel(&ids)
  }

  pub fn ids(&self) -> Vec<RequestId> {
    self.table().keys().cloned().collect()
  }

  pub fn get(&self, id: &RequestId) -> Option<RequestTicket> {
    self.table().get(id).cloned()
  }

  pub fn contains(&self, id: &RequestId) -> bool {
    self.table().contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.table().len()
  }

  pub fn is_empty(&self) -> bool {
    self.table().is_empty()
  }
}
