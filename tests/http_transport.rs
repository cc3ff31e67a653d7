//! End-to-end checks of the reqwest transport against a local mock server.

use std::sync::Arc;

use apidesk::api::{
  ApiConfig, ApiService, DirectorySink, ErrorCode, ErrorKind, ReqwestTransport, RequestOptions,
  StaticToken, UploadFile, REQUEST_ID_HEADER,
};
use apidesk::cache::{JsonRecord, MemoryStorage, PageSource, TableRecord};
use apidesk::table::{ServerDataTable, TableConfig, TableOptions, TOTAL_COUNT_HEADER};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(base_url: &str) -> ApiService {
  ApiService::new(
    ApiConfig::new(base_url).with_params("tenant=7"),
    Arc::new(ReqwestTransport::new().unwrap()),
    Arc::new(StaticToken("secret".into())),
  )
}

#[tokio::test]
async fn test_authenticated_get_sends_headers() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/me"))
    .and(query_param("tenant", "7"))
    .and(header("authorization", "Bearer secret"))
    .and(header_exists(REQUEST_ID_HEADER))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ada"})))
    .expect(1)
    .mount(&server)
    .await;

  let api = service(&server.uri());
  let response = api.get("/me/", RequestOptions::new()).await.unwrap();

  let body: serde_json::Value = response.json().unwrap();
  assert_eq!(body["name"], "Ada");
  assert_eq!(api.pending_requests(), 0);
}

#[tokio::test]
async fn test_json_error_message_is_surfaced() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/users/42"))
    .respond_with(
      ResponseTemplate::new(404).set_body_json(json!({"message": "No such user", "field": "id"})),
    )
    .mount(&server)
    .await;

  let err = service(&server.uri())
    .get("users/42", RequestOptions::new())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Http);
  assert_eq!(err.message(), "No such user");
  assert_eq!(err.code(), &ErrorCode::Status(404));
  assert_eq!(err.payload()["field"], "id");
}

#[tokio::test]
async fn test_plain_error_gets_generic_message() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/jobs"))
    .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
    .mount(&server)
    .await;

  let err = service(&server.uri())
    .post("jobs", &json!({"run": true}), RequestOptions::new())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Http);
  assert_eq!(err.message(), "Request failed with status code 500");
  assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
  // Bind then release a port so nothing is listening on it
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let uri = format!("http://{}", listener.local_addr().unwrap());
  drop(listener);

  let err = service(&uri)
    .get("anything", RequestOptions::without_auth())
    .await
    .unwrap_err();

  assert!(err.is_network());
  assert_eq!(err.code(), &ErrorCode::Internal("1001".into()));
}

#[tokio::test]
async fn test_download_uses_disposition_name() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/reports/7"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header("content-disposition", "attachment; filename=\"report.csv\"")
        .set_body_bytes(b"a,b\n1,2\n".to_vec()),
    )
    .mount(&server)
    .await;
  let dir = tempfile::tempdir().unwrap();
  let sink = DirectorySink::new(dir.path());

  let name = service(&server.uri())
    .get_download("reports/7", RequestOptions::new(), &sink)
    .await
    .unwrap();

  assert_eq!(name, "report.csv");
  let saved = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
  assert_eq!(saved, "a,b\n1,2\n");
}

#[tokio::test]
async fn test_upload_sends_multipart_parts() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/files"))
    .and(body_string_contains("name=\"file[0]\""))
    .and(body_string_contains("name=\"file[1]\""))
    .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
    .expect(1)
    .mount(&server)
    .await;

  let response = service(&server.uri())
    .upload(
      "files",
      vec![
        UploadFile::new("a.txt", b"first".to_vec()),
        UploadFile::new("b.txt", b"second".to_vec()).with_mime("text/plain"),
      ],
      RequestOptions::new(),
    )
    .await
    .unwrap();

  assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn test_table_fetches_once_then_serves_from_index() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/users"))
    .and(query_param("status", "open"))
    .and(query_param("limit", "2"))
    .and(query_param("page", "1"))
    .and(query_param("tenant", "7"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header(TOTAL_COUNT_HEADER, "5")
        .set_body_json(json!([{"_id": "u1", "name": "Ada"}, {"_id": "u2", "name": "Bo"}])),
    )
    .expect(1)
    .mount(&server)
    .await;

  let table: ServerDataTable<JsonRecord, MemoryStorage> = ServerDataTable::new(
    TableConfig::new("users", "users")
      .with_defaults(TableOptions::new().filter("status", "open").page_size(2)),
    service(&server.uri()),
    Arc::new(MemoryStorage::new()),
  )
  .unwrap();

  let first = table.get_for_table(false).await.unwrap();
  let second = table.get_for_table(false).await.unwrap();

  assert_eq!(first.source, PageSource::Network);
  assert_eq!(second.source, PageSource::Index);
  assert_eq!(second.total_items, 5);
  let ids: Vec<String> = second.items.iter().map(|r| r.record_id()).collect();
  assert_eq!(ids, vec!["u1", "u2"]);
}
