//! Integration tests for ReqwestClient against a mock server.

use cloudconnect_host_http::{HttpClient, HttpError, ReqwestClient, Request};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_returns_body_and_status() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/items"))
    .and(header("Accept", "application/json"))
    .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items":[1,2]}"#))
    .mount(&server)
    .await;

  let client = ReqwestClient::new(None).unwrap();
  let mut request = Request::new("get", format!("{}/items", server.uri()));
  request
    .headers
    .insert("Accept".to_string(), "application/json".to_string());

  let response = client.request(request).await.unwrap();

  assert_eq!(response.status, 200);
  assert_eq!(response.body, r#"{"items":[1,2]}"#);
  assert!(!response.is_empty());
}

#[tokio::test]
async fn test_post_sends_body() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/search"))
    .and(body_string(r#"{"q":"rust"}"#))
    .respond_with(ResponseTemplate::new(201).set_body_string("created"))
    .mount(&server)
    .await;

  let client = ReqwestClient::new(None).unwrap();
  let mut request = Request::new("POST", format!("{}/search", server.uri()));
  request.body = Some(r#"{"q":"rust"}"#.to_string());

  let response = client.request(request).await.unwrap();
  assert_eq!(response.status, 201);
  assert_eq!(response.body, "created");
}

#[tokio::test]
async fn test_not_found_is_typed() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/missing"))
    .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
    .mount(&server)
    .await;

  let client = ReqwestClient::new(None).unwrap();
  let err = client
    .request(Request::new("GET", format!("{}/missing", server.uri())))
    .await
    .unwrap_err();

  assert!(err.is_not_found());
  assert!(matches!(err, HttpError::Status { status: 404, ref body } if body == "nope"));
}

#[tokio::test]
async fn test_server_error_is_typed() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(503))
    .mount(&server)
    .await;

  let client = ReqwestClient::new(None).unwrap();
  let err = client
    .request(Request::new("GET", server.uri()))
    .await
    .unwrap_err();

  assert_eq!(err.status(), Some(503));
  assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_invalid_url() {
  let client = ReqwestClient::new(None).unwrap();
  let err = client
    .request(Request::new("GET", "not a url"))
    .await
    .unwrap_err();
  assert!(matches!(err, HttpError::InvalidUrl { .. }));
}
