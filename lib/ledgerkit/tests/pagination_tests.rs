//! Integration tests for cursor pagination using wiremock.

use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use ledgerkit::options::with_query;
use ledgerkit::{Client, ClientOptions, CursorSource, Error, Method, RequestConfig, RetryConfig};
use serde::Deserialize;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param, query_param_is_missing},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct Transaction {
    id: String,
}

fn client(server: &MockServer) -> Client {
    let options = ClientOptions::new()
        .api_key("sk_test_123")
        .base_url_override(url::Url::parse(&server.uri()).expect("url"))
        .retry(
            RetryConfig::default()
                .max_retries(1)
                .initial_delay(Duration::from_millis(1)),
        );
    Client::new(options).expect("client")
}

fn transactions(ids: &[&str]) -> serde_json::Value {
    ids.iter().map(|id| json!({"id": id})).collect()
}

fn list_transactions() -> RequestConfig {
    RequestConfig::new(Method::Get, "/transactions").option(with_query("limit", "2"))
}

async fn mount_three_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": transactions(&["t1", "t2"]),
            "next_cursor": "c2",
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("limit", "2"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": transactions(&["t3", "t4"]),
            "next_cursor": "c3",
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("cursor", "c3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": transactions(&["t5"]),
            "next_cursor": null,
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_auto_paging_yields_all_items_in_order() {
    let mock_server = MockServer::start().await;
    mount_three_pages(&mock_server).await;

    let page = client(&mock_server)
        .list::<Transaction>(list_transactions())
        .await
        .expect("first page");
    assert_eq!(page.items().len(), 2);

    let ids = page
        .auto_paging()
        .map_ok(|t| t.id)
        .try_collect::<Vec<_>>()
        .await
        .expect("all pages");
    assert_eq!(ids, ["t1", "t2", "t3", "t4", "t5"]);
}

#[tokio::test]
async fn test_manual_paging() {
    let mock_server = MockServer::start().await;
    mount_three_pages(&mock_server).await;

    let mut page = client(&mock_server)
        .list::<Transaction>(list_transactions())
        .await
        .expect("first page");
    let mut count = page.items().len();

    while let Some(next) = page.next_page().await.expect("next page") {
        count += next.items().len();
        page = next;
    }

    assert_eq!(count, 5);
    assert!(!page.has_next_page());
    assert_eq!(page.next_cursor(), None);
}

#[tokio::test]
async fn test_cursor_from_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param_is_missing("after"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Next-Cursor", "e2")
                .set_body_json(json!({"data": transactions(&["e1"])})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("after", "e2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": transactions(&["e2"]),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = RequestConfig::new(Method::Get, "/events")
        .cursor_source(CursorSource::Header("x-next-cursor".to_string()))
        .cursor_param("after");
    let ids = client(&mock_server)
        .list::<Transaction>(config)
        .await
        .expect("first page")
        .auto_paging()
        .map_ok(|t| t.id)
        .try_collect::<Vec<_>>()
        .await
        .expect("all pages");
    assert_eq!(ids, ["e1", "e2"]);
}

#[tokio::test]
async fn test_failure_mid_stream_keeps_yielded_items() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": transactions(&["t1", "t2"]),
            "next_cursor": "expired",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("cursor", "expired"))
        .respond_with(ResponseTemplate::new(410).set_body_json(json!({
            "type": "cursor_expired",
            "title": "Cursor expired",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let results = client(&mock_server)
        .list::<Transaction>(RequestConfig::new(Method::Get, "/transactions"))
        .await
        .expect("first page")
        .auto_paging()
        .collect::<Vec<_>>()
        .await;

    assert_eq!(results.len(), 3);
    assert!(matches!(&results[0], Ok(t) if t.id == "t1"));
    assert!(matches!(&results[1], Ok(t) if t.id == "t2"));
    let Err(Error::Api(api)) = &results[2] else {
        panic!("expected an API error, got {:?}", results[2]);
    };
    assert_eq!(api.status(), 410);
    assert_eq!(api.message(), "Cursor expired");
}

#[tokio::test]
async fn test_page_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .list::<Transaction>(RequestConfig::new(Method::Get, "/transactions"))
        .await
        .expect_err("not a list response");
    assert!(matches!(err, Error::Decode { .. }), "{err:?}");
}
