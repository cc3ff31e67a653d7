//! Transport seam between the API service and the HTTP stack.
//!
//! The service only talks to a [`Transport`]; [`ReqwestTransport`] is the
//! production implementation. Cancellation is handled by the caller dropping
//! the in-flight `send` future, which closes the underlying connection.

use async_trait::async_trait;
use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How the caller wants the response body treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
  #[default]
  Json,
  /// File downloads
  Binary,
}

/// A file sent as part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadFile {
  pub file_name: String,
  pub mime: Option<String>,
  pub content: Bytes,
}

impl UploadFile {
  pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
    Self {
      file_name: file_name.into(),
      mime: None,
      content: content.into(),
    }
  }

  pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
    self.mime = Some(mime.into());
    self
  }
}

#[derive(Debug, Clone)]
pub enum FormValue {
  Text(String),
  File(UploadFile),
}

#[derive(Debug, Clone)]
pub struct FormPart {
  pub name: String,
  pub value: FormValue,
}

impl FormPart {
  pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: FormValue::Text(value.into()),
    }
  }

  pub fn file(name: impl Into<String>, file: UploadFile) -> Self {
    Self {
      name: name.into(),
      value: FormValue::File(file),
    }
  }
}

/// Request payload. Forms are passed through as multipart, everything else is JSON.
#[derive(Debug, Clone)]
pub enum RequestBody {
  Json(Value),
  Form(Vec<FormPart>),
}

/// Fully built request handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
  pub method: Method,
  pub url: String,
  pub headers: HeaderMap,
  pub body: Option<RequestBody>,
  pub response_type: ResponseType,
}

/// Raw response handle. Callers decode the body themselves.
#[derive(Debug, Clone)]
pub struct TransportResponse {
  status: StatusCode,
  headers: HeaderMap,
  body: Bytes,
}

impl TransportResponse {
  pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
    Self {
      status,
      headers,
      body,
    }
  }

  pub fn status(&self) -> StatusCode {
    self.status
  }

  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  pub fn body(&self) -> &Bytes {
    &self.body
  }

  pub fn into_body(self) -> Bytes {
    self.body
  }

  /// Header value as a string, if present and valid UTF-8.
  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(name).and_then(|v| v.to_str().ok())
  }

  /// Whether the declared content type is JSON
  pub fn is_json(&self) -> bool {
    self
      .headers
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(|ct| ct.to_ascii_lowercase().contains("json"))
      .unwrap_or(false)
  }

  pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
    serde_json::from_slice(&self.body)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Discriminator for failures that never produced a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  Network,
  Cancelled,
  Other,
}

/// A failed transport call, before classification.
#[derive(Debug, Clone)]
pub struct TransportFailure {
  pub kind: FailureKind,
  pub message: String,
  pub response: Option<TransportResponse>,
  pub response_type: ResponseType,
}

impl TransportFailure {
  pub fn new(kind: FailureKind, message: impl Into<String>, response_type: ResponseType) -> Self {
    Self {
      kind,
      message: message.into(),
      response: None,
      response_type,
    }
  }

  /// Failure for a response that arrived with a non-success status.
  pub fn from_status(response: TransportResponse, response_type: ResponseType) -> Self {
    Self {
      kind: FailureKind::Other,
      message: format!(
        "Request failed with status code {}",
        response.status().as_u16()
      ),
      response: Some(response),
      response_type,
    }
  }

  fn from_reqwest(err: &reqwest::Error, response_type: ResponseType) -> Self {
    let kind = if err.is_connect() || err.is_timeout() {
      FailureKind::Network
    } else {
      FailureKind::Other
    };
    Self::new(kind, err.to_string(), response_type)
  }
}

/// The primitive that actually performs HTTP.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Send a request. Non-success statuses are returned as `Ok`.
  async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: Client,
}

impl ReqwestTransport {
  pub fn new() -> Result<Self> {
    let client = Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Ok(Self { client })
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
    let response_type = request.response_type;

    let mut builder = self
      .client
      .request(request.method, &request.url)
      .headers(request.headers);

    builder = match request.body {
      None => builder,
      Some(RequestBody::Json(value)) => builder.json(&value),
      Some(RequestBody::Form(parts)) => builder.multipart(
        build_form(parts).map_err(|e| TransportFailure::from_reqwest(&e, response_type))?,
      ),
    };

    let response = builder
      .send()
      .await
      .map_err(|e| TransportFailure::from_reqwest(&e, response_type))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
      .bytes()
      .await
      .map_err(|e| TransportFailure::from_reqwest(&e, response_type))?;

    Ok(TransportResponse::new(status, headers, body))
  }
}

fn build_form(parts: Vec<FormPart>) -> reqwest::Result<Form> {
  let mut form = Form::new();
  for part in parts {
    form = match part.value {
      FormValue::Text(text) => form.text(part.name, text),
      FormValue::File(file) => {
        let mut file_part = Part::bytes(file.content.to_vec()).file_name(file.file_name);
        if let Some(mime) = file.mime.as_deref() {
          file_part = file_part.mime_str(mime)?;
        }
        form.part(part.name, file_part)
      }
    };
  }
  Ok(form)
}
