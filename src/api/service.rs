//! Authenticated request façade.
//!
//! Every verb goes through [`ApiService::execute`]:
//! 1. register a ticket with the tracker
//! 2. build headers (`X-Request-Id`, bearer token when required)
//! 3. spawn the transport call wrapped in the ticket's abort registration
//! 4. complete the ticket, then classify the outcome
//!
//! The `*_adv` variants hand back the ticket id together with the in-flight
//! response so callers can cancel before it settles.

use std::sync::Arc;

use futures::future::{Abortable, Aborted};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::download::{file_name_from_disposition, DownloadSink};
use super::error::ApiError;
use super::ticket::{RequestId, RequestTicket};
use super::token::TokenProvider;
use super::tracker::RequestTracker;
use super::transport::{
  FormPart, RequestBody, ResponseType, Transport, TransportFailure, TransportRequest,
  TransportResponse, UploadFile,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Construction parameters for an [`ApiService`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
  /// Base address, e.g. `https://api.example.com`
  pub base_url: String,
  /// Query string appended to every relative path, e.g. `tenant=7`
  pub base_url_params: String,
  /// Whether calls authenticate unless overridden per call
  pub use_authentication: bool,
}

impl ApiConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      base_url_params: String::new(),
      use_authentication: true,
    }
  }

  pub fn with_params(mut self, params: impl Into<String>) -> Self {
    self.base_url_params = params.into();
    self
  }

  pub fn with_authentication(mut self, enabled: bool) -> Self {
    self.use_authentication = enabled;
    self
  }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  pub headers: HeaderMap,
  /// Overrides [`ApiConfig::use_authentication`] when set
  pub auth: Option<bool>,
}

impl RequestOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
    self.headers.insert(name, value);
    self
  }

  pub fn auth(mut self, required: bool) -> Self {
    self.auth = Some(required);
    self
  }

  pub fn without_auth() -> Self {
    Self::default().auth(false)
  }
}

/// A request that is already in flight.
pub struct AdvancedResponse {
  pub id: RequestId,
  handle: JoinHandle<Result<TransportResponse, ApiError>>,
}

impl AdvancedResponse {
  /// Wait for the request to settle.
  pub async fn response(self) -> Result<TransportResponse, ApiError> {
    match self.handle.await {
      Ok(result) => result,
      Err(join_error) => Err(ApiError::unrecoverable(
        self.id.as_str(),
        Some(&join_error.to_string()),
      )),
    }
  }
}

struct Inner {
  id: Uuid,
  config: ApiConfig,
  transport: Arc<dyn Transport>,
  tokens: Arc<dyn TokenProvider>,
  tracker: RequestTracker,
}

/// Client-side API façade. Cheap to clone; clones share the request tracker.
#[derive(Clone)]
pub struct ApiService {
  inner: Arc<Inner>,
}

impl ApiService {
  pub fn new(
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
  ) -> Self {
    let id = Uuid::new_v4();
    info!(service = %id, base_url = %config.base_url, "api service constructed");

    Self {
      inner: Arc::new(Inner {
        id,
        config,
        transport,
        tokens,
        tracker: RequestTracker::new(),
      }),
    }
  }

  pub fn id(&self) -> Uuid {
    self.inner.id
  }

  pub fn config(&self) -> &ApiConfig {
    &self.inner.config
  }

  /// Resolve a path against the base address and append the static params.
  /// Anything starting with `http` is taken as a full URL and used as given.
  pub fn build_url(&self, path: &str) -> String {
    let config = &self.inner.config;

    if path.starts_with("http") {
      return path.to_string();
    }

    let clean_path = path.trim_matches('/');
    let mut url = format!("{}/{}", config.base_url.trim_end_matches('/'), clean_path);
    if !config.base_url_params.is_empty() {
      url.push(if clean_path.contains('?') { '&' } else { '?' });
      url.push_str(&config.base_url_params);
    }
    url
  }

  // --------------------------------------------------------------------------
  // Cancellation
  // --------------------------------------------------------------------------

  pub fn cancel_request(&self, id: &RequestId) {
    self.cancel_requests(std::slice::from_ref(id));
  }

  pub fn cancel_requests(&self, ids: &[RequestId]) {
    self.inner.tracker.cancel(ids);
  }

  pub fn cancel_all(&self) {
    let cancelled = self.inner.tracker.cancel_all();
    if cancelled > 0 {
      info!(service = %self.inner.id, cancelled, "cancelled all outstanding requests");
    }
  }

  /// Number of requests that have not settled or been cancelled.
  pub fn pending_requests(&self) -> usize {
    self.inner.tracker.len()
  }

  pub fn is_pending(&self, id: &RequestId) -> bool {
    self.inner.tracker.contains(id)
  }

  // --------------------------------------------------------------------------
  // Verbs
  // --------------------------------------------------------------------------

  pub async fn get_adv(
    &self,
    path: &str,
    options: RequestOptions,
  ) -> Result<AdvancedResponse, ApiError> {
    self
      .execute(Method::GET, path, None, options, ResponseType::Json)
      .await
  }

  pub async fn get(&self, path: &str, options: RequestOptions) -> Result<TransportResponse, ApiError> {
    self.get_adv(path, options).await?.response().await
  }

  pub async fn post_adv<B: Serialize>(
    &self,
    path: &str,
    body: &B,
    options: RequestOptions,
  ) -> Result<AdvancedResponse, ApiError> {
    let body = json_body(body)?;
    self
      .execute(Method::POST, path, Some(body), options, ResponseType::Json)
      .await
  }

  pub async fn post<B: Serialize>(
    &self,
    path: &str,
    body: &B,
    options: RequestOptions,
  ) -> Result<TransportResponse, ApiError> {
    self.post_adv(path, body, options).await?.response().await
  }

  pub async fn put_adv<B: Serialize>(
    &self,
    path: &str,
    body: &B,
    options: RequestOptions,
  ) -> Result<AdvancedResponse, ApiError> {
    let body = json_body(body)?;
    self
      .execute(Method::PUT, path, Some(body), options, ResponseType::Json)
      .await
  }

  pub async fn put<B: Serialize>(
    &self,
    path: &str,
    body: &B,
    options: RequestOptions,
  ) -> Result<TransportResponse, ApiError> {
    self.put_adv(path, body, options).await?.response().await
  }

  pub async fn delete_adv(
    &self,
    path: &str,
    options: RequestOptions,
  ) -> Result<AdvancedResponse, ApiError> {
    self
      .execute(Method::DELETE, path, None, options, ResponseType::Json)
      .await
  }

  pub async fn delete(
    &self,
    path: &str,
    options: RequestOptions,
  ) -> Result<TransportResponse, ApiError> {
    self.delete_adv(path, options).await?.response().await
  }

  /// POST a multipart form. The body is passed through untouched.
  pub async fn post_form(
    &self,
    path: &str,
    parts: Vec<FormPart>,
    options: RequestOptions,
  ) -> Result<TransportResponse, ApiError> {
    self
      .execute(
        Method::POST,
        path,
        Some(RequestBody::Form(parts)),
        options,
        ResponseType::Json,
      )
      .await?
      .response()
      .await
  }

  /// POST files as multipart parts named `file[0]`, `file[1]`, ...
  pub async fn upload(
    &self,
    path: &str,
    files: Vec<UploadFile>,
    options: RequestOptions,
  ) -> Result<TransportResponse, ApiError> {
    let parts = files
      .into_iter()
      .enumerate()
      .map(|(i, file)| FormPart::file(format!("file[{}]", i), file))
      .collect();
    self.post_form(path, parts, options).await
  }

  /// GET a file and hand it to `sink`. Returns the file name used.
  pub async fn get_download(
    &self,
    path: &str,
    options: RequestOptions,
    sink: &dyn DownloadSink,
  ) -> Result<String, ApiError> {
    let pending = self
      .execute(Method::GET, path, None, options, ResponseType::Binary)
      .await?;
    save_download(pending, sink).await
  }

  /// POST a JSON body, then hand the binary response to `sink`.
  pub async fn post_download<B: Serialize>(
    &self,
    path: &str,
    body: &B,
    options: RequestOptions,
    sink: &dyn DownloadSink,
  ) -> Result<String, ApiError> {
    let body = json_body(body)?;
    let pending = self
      .execute(Method::POST, path, Some(body), options, ResponseType::Binary)
      .await?;
    save_download(pending, sink).await
  }

  // --------------------------------------------------------------------------
  // Request lifecycle
  // --------------------------------------------------------------------------

  /// Send a request and hand back its ticket id with the in-flight result.
  /// `options.auth` overrides the configured authentication default.
  pub async fn execute(
    &self,
    method: Method,
    path: &str,
    body: Option<RequestBody>,
    options: RequestOptions,
    response_type: ResponseType,
  ) -> Result<AdvancedResponse, ApiError> {
    let url = self.build_url(path);
    let requires_auth = options.auth.unwrap_or(self.inner.config.use_authentication);

    let (ticket, registration) = self
      .inner
      .tracker
      .register(url.clone(), body.clone(), requires_auth);

    let headers = match self.build_headers(options.headers, &ticket).await {
      Ok(headers) => headers,
      Err(err) => {
        self.inner.tracker.complete(&ticket.id);
        warn!(id = %ticket.id, %url, "request rejected before sending: {}", err);
        return Err(err);
      }
    };

    let request = TransportRequest {
      method,
      url,
      headers,
      body,
      response_type,
    };

    debug!(id = %ticket.id, method = %request.method, url = %request.url, "dispatching request");

    let inner = Arc::clone(&self.inner);
    let id = ticket.id.clone();
    let handle = tokio::spawn(async move {
      let outcome = Abortable::new(inner.transport.send(request), registration).await;
      // Settled: untrack before the caller sees the result.
      inner.tracker.complete(&id);
      settle(outcome, response_type, &id)
    });

    Ok(AdvancedResponse {
      id: ticket.id,
      handle,
    })
  }

  async fn build_headers(
    &self,
    mut headers: HeaderMap,
    ticket: &RequestTicket,
  ) -> Result<HeaderMap, ApiError> {
    let request_id = HeaderValue::from_str(ticket.id.as_str())
      .map_err(|e| ApiError::unrecoverable(ticket.id.as_str(), Some(&e.to_string())))?;
    headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), request_id);

    if ticket.requires_auth {
      let token = self
        .inner
        .tokens
        .access_token()
        .await
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::auth(ticket.id.as_str()))?;

      let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ApiError::auth(ticket.id.as_str()))?;
      headers.insert(AUTHORIZATION, bearer);
    }

    Ok(headers)
  }
}

fn settle(
  outcome: Result<Result<TransportResponse, TransportFailure>, Aborted>,
  response_type: ResponseType,
  id: &RequestId,
) -> Result<TransportResponse, ApiError> {
  let result = match outcome {
    Err(Aborted) => Err(ApiError::cancelled(id.as_str())),
    Ok(Err(failure)) => Err(ApiError::classify(&failure, id.as_str())),
    Ok(Ok(response)) if response.status().is_success() => Ok(response),
    Ok(Ok(response)) => Err(ApiError::classify(
      &TransportFailure::from_status(response, response_type),
      id.as_str(),
    )),
  };

  if let Err(err) = &result {
    debug!(%id, kind = ?err.kind(), code = %err.code(), "request failed: {}", err);
  }
  result
}

/// Serialize a JSON body. No ticket exists yet on failure, so the error gets
/// a fresh correlation id of its own.
fn json_body<B: Serialize>(body: &B) -> Result<RequestBody, ApiError> {
  serde_json::to_value(body).map(RequestBody::Json).map_err(|e| {
    let id = RequestId::generate();
    warn!(%id, "request body could not be serialized: {}", e);
    ApiError::unrecoverable(id.as_str(), Some(&e.to_string()))
  })
}

async fn save_download(pending: AdvancedResponse, sink: &dyn DownloadSink) -> Result<String, ApiError> {
  let id = pending.id.clone();
  let response = pending.response().await?;
  let file_name = file_name_from_disposition(response.header("content-disposition"));
  sink
    .save(&file_name, response.into_body())
    .await
    .map_err(|e| ApiError::unrecoverable(id.as_str(), Some(&e.to_string())))?;
  Ok(file_name)
}
