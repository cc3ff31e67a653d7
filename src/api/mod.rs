//! Authenticated HTTP access.
//!
//! - [`ApiService`] is the façade callers use: it builds URLs, attaches the
//!   request id and bearer token, and classifies failures into [`ApiError`]
//! - [`RequestTracker`] holds one ticket per in-flight request so that any
//!   subset can be cancelled
//! - [`Transport`] is the seam to the HTTP client; [`ReqwestTransport`] is the
//!   real one

pub mod download;
pub mod error;
pub mod service;
pub mod ticket;
pub mod token;
pub mod tracker;
pub mod transport;

pub use download::{file_name_from_disposition, DirectorySink, DownloadSink};
pub use error::{ApiError, ErrorCode, ErrorKind};
pub use service::{AdvancedResponse, ApiConfig, ApiService, RequestOptions, REQUEST_ID_HEADER};
pub use ticket::{RequestId, RequestTicket};
pub use token::{EnvToken, FnToken, NoToken, StaticToken, TokenProvider};
pub use tracker::RequestTracker;
pub use transport::{
  FormPart, FormValue, ReqwestTransport, RequestBody, ResponseType, Transport, TransportFailure,
  TransportRequest, TransportResponse, UploadFile,
};
