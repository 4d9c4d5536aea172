use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::*;

async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(AppState::in_memory())).await.unwrap();
    });
    format!("http://{addr}")
}

async fn next_batch<S>(stream: &mut S) -> Vec<Value>
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("no feed message in time")
            .expect("feed closed")
            .unwrap();
        if let WsMessage::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

// =============================================================================
// status mapping
// =============================================================================

#[test]
fn store_error_to_status_maps_not_found() {
    let err = StoreError::NotFound { collection: "sharedNotes".into(), id: 1 };
    assert_eq!(store_error_to_status(&err), StatusCode::NOT_FOUND);
}

#[test]
fn store_error_to_status_maps_invalid_collection() {
    let err = StoreError::InvalidCollection("a//b".into());
    assert_eq!(store_error_to_status(&err), StatusCode::BAD_REQUEST);
}

#[test]
fn store_error_to_status_maps_serialize_to_server_error() {
    let err = StoreError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
    assert_eq!(store_error_to_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn store_error_to_status_maps_corrupt_record() {
    let err = StoreError::CorruptRecord { collection: "sharedNotes".into(), id: 1 };
    assert_eq!(store_error_to_status(&err), StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// REST
// =============================================================================

#[tokio::test]
async fn healthz_is_ok() {
    let base = serve().await;
    let body = reqwest::get(format!("{base}/healthz")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn create_patch_list_delete() {
    let base = serve().await;
    let http = reqwest::Client::new();
    let q = [("collection", "users/alice/notes")];

    let created = http
        .post(format!("{base}/api/records"))
        .query(&q)
        .json(&json!({"id": 7, "content": "a", "color": "yellow", "row": 0, "col": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let patched = http
        .patch(format!("{base}/api/records/7"))
        .query(&q)
        .json(&json!({"content": "b", "row": 2}))
        .send()
        .await
        .unwrap();
    assert!(patched.status().is_success());

    let batch: Vec<Value> = http
        .get(format!("{base}/api/records"))
        .query(&q)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["content"], "b");
    assert_eq!(batch[0]["row"], 2);
    assert_eq!(batch[0]["col"], 0);

    for _ in 0..2 {
        let deleted = http.delete(format!("{base}/api/records/7")).query(&q).send().await.unwrap();
        assert!(deleted.status().is_success());
    }
    let batch: Vec<Value> = http
        .get(format!("{base}/api/records"))
        .query(&q)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn patch_missing_record_is_not_found() {
    let base = serve().await;
    let response = reqwest::Client::new()
        .patch(format!("{base}/api/records/404"))
        .query(&[("collection", "sharedNotes")])
        .json(&json!({"content": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "E_RECORD_NOT_FOUND");
}

#[tokio::test]
async fn invalid_collection_is_bad_request() {
    let base = serve().await;
    let response = reqwest::Client::new()
        .get(format!("{base}/api/records"))
        .query(&[("collection", "users//notes")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "E_INVALID_COLLECTION");
}

// =============================================================================
// websocket feed
// =============================================================================

#[tokio::test]
async fn feed_pushes_current_batch_then_changes() {
    let base = serve().await;
    let ws_url = format!("{}/api/feed?collection=sharedNotes", base.replacen("http://", "ws://", 1));
    let (mut stream, _) = tokio_tungstenite::connect_async(ws_url.as_str()).await.unwrap();

    assert!(next_batch(&mut stream).await.is_empty());

    reqwest::Client::new()
        .post(format!("{base}/api/records"))
        .query(&[("collection", "sharedNotes")])
        .json(&json!({"id": 1, "content": "", "color": "blue", "createdBy": "alice"}))
        .send()
        .await
        .unwrap();

    let batch = next_batch(&mut stream).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["createdBy"], "alice");
}

#[tokio::test]
async fn feed_rejects_invalid_collection() {
    let base = serve().await;
    let ws_url = format!("{}/api/feed?collection=bad%20path", base.replacen("http://", "ws://", 1));
    assert!(tokio_tungstenite::connect_async(ws_url.as_str()).await.is_err());
}
