//! Client for the store server.
//!
//! Writes and snapshots go over the REST routes; subscriptions open a
//! websocket on `/api/feed` and forward every pushed batch into a local
//! watch channel. The feed task ends when the socket closes or every
//! receiver has been dropped.

#[cfg(test)]
#[path = "remote_test.rs"]
mod remote_test;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{CollectionPath, Feed, NoteStore, StoreError};
use crate::note::{NoteId, NoteRecord, RecordPatch};

pub struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteStore {
    /// Build a client for the server at `base_url` (e.g. `http://localhost:3000`).
    ///
    /// # Errors
    ///
    /// Returns `Http` if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn records_url(&self) -> String {
        format!("{}/api/records", self.base_url)
    }

    fn record_url(&self, id: NoteId) -> String {
        format!("{}/api/records/{id}", self.base_url)
    }

    fn feed_url(&self, collection: &CollectionPath) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/api/feed?collection={collection}")
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Status { status: status.as_u16(), message })
}

fn parse_batch_message(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Vec<Value>>(text) {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!(error = %e, "feed: ignoring non-batch message");
            None
        }
    }
}

#[async_trait::async_trait]
impl NoteStore for RemoteStore {
    async fn create(&self, collection: &CollectionPath, record: &NoteRecord) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.records_url())
            .query(&[("collection", collection.as_str())])
            .json(record)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn update(&self, collection: &CollectionPath, id: NoteId, patch: &RecordPatch) -> Result<(), StoreError> {
        let response = self
            .http
            .patch(self.record_url(id))
            .query(&[("collection", collection.as_str())])
            .json(patch)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound { collection: collection.to_string(), id });
        }
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: NoteId) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.record_url(id))
            .query(&[("collection", collection.as_str())])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn snapshot(&self, collection: &CollectionPath) -> Result<Vec<Value>, StoreError> {
        let response = self
            .http
            .get(self.records_url())
            .query(&[("collection", collection.as_str())])
            .send()
            .await?;
        Ok(check(response).await?.json::<Vec<Value>>().await?)
    }

    async fn subscribe(&self, collection: &CollectionPath) -> Result<Feed, StoreError> {
        let url = self.feed_url(collection);
        let (mut stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| StoreError::WsConnect(Box::new(error)))?;

        // The server pushes the current batch first; wait for it so the feed
        // never starts from a fabricated empty batch.
        let first = loop {
            let Some(message) = stream.next().await else {
                return Err(StoreError::WsClosed);
            };
            match message.map_err(|error| StoreError::WsConnect(Box::new(error)))? {
                Message::Text(text) => {
                    if let Some(batch) = parse_batch_message(&text) {
                        break batch;
                    }
                }
                Message::Close(_) => return Err(StoreError::WsClosed),
                _ => {}
            }
        };

        let (tx, rx) = watch::channel(first);
        let collection = collection.clone();
        info!(%collection, "feed: subscribed");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    message = stream.next() => {
                        let Some(Ok(message)) = message else { break };
                        match message {
                            Message::Text(text) => {
                                if let Some(batch) = parse_batch_message(&text) {
                                    tx.send_replace(batch);
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                }
            }
            debug!(%collection, "feed: closed");
        });

        Ok(rx)
    }
}
