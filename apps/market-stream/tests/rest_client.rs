//! REST Client Integration Tests
//!
//! Exercises `RestClient` against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use market_stream::{ApiKey, Fetch, FetchError, RestClient, RestError};

const API_KEY: &str = "rest-key";

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let client = RestClient::new(server.uri(), ApiKey::new(API_KEY).unwrap()).unwrap();
    (server, client)
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
async fn fetch_sends_bearer_key_and_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v3/reference/tickers"))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .and(query_param("ticker", "AAPL"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [{"ticker": "AAPL", "name": "Apple Inc."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client
        .fetch(
            "/v3/reference/tickers",
            &params(&[("ticker", "AAPL"), ("limit", "1")]),
        )
        .await
        .unwrap();

    assert_eq!(body["results"][0]["ticker"], "AAPL");
}

#[tokio::test]
async fn path_without_leading_slash() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/marketstatus/now"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"market": "open"})))
        .mount(&server)
        .await;

    let body = client.fetch_value("v1/marketstatus/now", &[]).await.unwrap();
    assert_eq!(body["market"], "open");
}

#[tokio::test]
async fn unauthorized_response() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"status": "ERROR", "error": "Unknown API Key"})),
        )
        .mount(&server)
        .await;

    let err = client.fetch::<Value>("/v2/aggs", &[]).await.unwrap_err();
    match err {
        RestError::Unauthorized { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unknown API Key");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn api_error_carries_status_and_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Route not found"})))
        .mount(&server)
        .await;

    let err = client.fetch_value("/v9/nothing", &[]).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Api { status: 404, ref message } if message == "Route not found"
    ));
}

#[tokio::test]
async fn empty_body_is_null() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let body = client.fetch_value("/v1/empty", &[]).await.unwrap();
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn invalid_json_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client.fetch::<Value>("/v1/broken", &[]).await.unwrap_err();
    assert!(matches!(err, RestError::JsonParse(_)));
}
