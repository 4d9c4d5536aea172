//! WebSocket feed: pushes a collection's full batch on every change.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → subscribe to the collection, send the current batch
//! 2. Every feed change → send the new batch as one JSON array text frame
//! 3. Client close or socket error → drop the subscription

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::error_response;
use super::records::CollectionQuery;
use crate::state::AppState;
use crate::store::{CollectionPath, Feed, StoreError};

pub async fn handle_feed(
    State(state): State<AppState>,
    Query(query): Query<CollectionQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let collection = match CollectionPath::parse(&query.collection) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    // Subscribe before the upgrade so a bad store surfaces as an HTTP error.
    let feed = match state.store.subscribe(&collection).await {
        Ok(feed) => feed,
        Err(e) => return error_response(&e),
    };
    ws.on_upgrade(move |socket| run_feed(socket, collection, feed))
}

async fn run_feed(mut socket: WebSocket, collection: CollectionPath, mut feed: Feed) {
    let conn_id = Uuid::new_v4();
    info!(%conn_id, %collection, "feed: client connected");

    let batch = feed.borrow_and_update().clone();
    if send_batch(&mut socket, &batch).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let batch = feed.borrow_and_update().clone();
                if send_batch(&mut socket, &batch).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    None | Some(Err(_) | Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(%conn_id, %collection, "feed: client disconnected");
}

async fn send_batch(socket: &mut WebSocket, batch: &[Value]) -> Result<(), StoreError> {
    let text = serde_json::to_string(batch)?;
    socket.send(Message::Text(text.into())).await.map_err(|e| {
        warn!(error = %e, "feed: send failed");
        StoreError::WsClosed
    })
}
