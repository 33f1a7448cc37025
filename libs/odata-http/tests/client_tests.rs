#![allow(clippy::unwrap_used, clippy::expect_used)]

use httpmock::prelude::*;
use odata_http::{HttpClient, HttpError};
use serde_json::{Value, json};
use std::time::Duration;

fn client() -> HttpClient {
    HttpClient::builder()
        .allow_insecure_http()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn json_opt_returns_collection_envelope() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/odata/Products")
            .query_param("$top", "2");
        then.status(200).json_body(json!({
            "@odata.context": "$metadata#Products",
            "value": [{"Id": 1}, {"Id": 2}]
        }));
    });

    let body: Option<Value> = client()
        .get(&server.url("/odata/Products"))
        .query("$top", "2")
        .send()
        .await
        .unwrap()
        .json_opt()
        .await
        .unwrap();

    let body = body.unwrap();
    assert_eq!(body["value"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn json_opt_on_no_content_is_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PATCH).path("/odata/Products(1)");
        then.status(204);
    });

    let body: Option<Value> = client()
        .patch(&server.url("/odata/Products(1)"))
        .json(&json!({"Name": "Tea"}))
        .unwrap()
        .send()
        .await
        .unwrap()
        .json_opt()
        .await
        .unwrap();

    assert!(body.is_none());
}

#[tokio::test]
async fn server_error_surfaces_as_http_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/odata/Products(3)");
        then.status(409).body("conflict");
    });

    let err = client()
        .delete(&server.url("/odata/Products(3)"))
        .send()
        .await
        .unwrap()
        .json_opt::<Value>()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(http::StatusCode::CONFLICT));
    assert!(matches!(err, HttpError::HttpStatus { ref body_preview, .. } if body_preview == "conflict"));
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    let err = client()
        .get("http://127.0.0.1:1/odata")
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Transport(_)));
}
