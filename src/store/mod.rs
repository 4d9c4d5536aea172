//! Backing document store.
//!
//! ARCHITECTURE
//! ============
//! Notes live as schemaless JSON documents addressed by `(collection, id)`.
//! Writers create, partially update, and delete documents; readers subscribe
//! to a collection and receive its full current batch on every change. The
//! store does no conflict resolution of its own.
//!
//! Three implementations share the [`NoteStore`] trait: an in-process
//! [`memory::MemoryStore`], a Postgres-backed [`postgres::PgStore`], and a
//! [`remote::RemoteStore`] that talks to the store server over HTTP and a
//! websocket feed.

pub mod memory;
pub mod postgres;
pub mod remote;


use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::watch;

use crate::note::{NoteId, NoteRecord, RecordPatch};

/// Collection holding every shared note.
pub const SHARED_COLLECTION: &str = "sharedNotes";

/// Live view of one collection. Always holds the latest full batch.
pub type Feed = watch::Receiver<Vec<Value>>;

// =============================================================================
// COLLECTION PATH
// =============================================================================

/// Slash-separated collection path, e.g. `users/alice/notes`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A user's personal note collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCollection` if `user_id` is not a valid path segment.
    pub fn personal(user_id: &str) -> Result<Self, StoreError> {
        Self::parse(&format!("users/{user_id}/notes"))
    }

    /// The shared note collection.
    #[must_use]
    pub fn shared() -> Self {
        Self(SHARED_COLLECTION.to_owned())
    }

    /// Validate a raw path. Segments must be non-empty and use only ASCII
    /// alphanumerics, `-`, `_`, `.` or `@`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCollection` for empty paths or bad segments.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let valid = !raw.is_empty()
            && raw.split('/').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
            });
        if valid { Ok(Self(raw.to_owned())) } else { Err(StoreError::InvalidCollection(raw.to_owned())) }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: NoteId },
    #[error("invalid collection path: {0}")]
    InvalidCollection(String),
    #[error("stored record is not a JSON object: {collection}/{id}")]
    CorruptRecord { collection: String, id: NoteId },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed before first snapshot")]
    WsClosed,
    #[error("store server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl crate::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_RECORD_NOT_FOUND",
            Self::InvalidCollection(_) => "E_INVALID_COLLECTION",
            Self::CorruptRecord { .. } => "E_CORRUPT_RECORD",
            Self::Serialize(_) => "E_SERIALIZE",
            Self::Database(_) => "E_DATABASE",
            Self::Http(_) | Self::Status { .. } => "E_UPSTREAM",
            Self::WsConnect(_) | Self::WsClosed => "E_FEED",
        }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait NoteStore: Send + Sync {
    /// Create or overwrite the record `record.id` in `collection`.
    async fn create(&self, collection: &CollectionPath, record: &NoteRecord) -> Result<(), StoreError>;

    /// Merge `patch` into an existing record.
    ///
    /// Returns `NotFound` if the record does not exist.
    async fn update(&self, collection: &CollectionPath, id: NoteId, patch: &RecordPatch) -> Result<(), StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, collection: &CollectionPath, id: NoteId) -> Result<(), StoreError>;

    /// Current full batch of `collection`, ordered by id.
    async fn snapshot(&self, collection: &CollectionPath) -> Result<Vec<Value>, StoreError>;

    /// Subscribe to `collection`. The feed starts at the current batch.
    async fn subscribe(&self, collection: &CollectionPath) -> Result<Feed, StoreError>;
}

// =============================================================================
// FEED HUB
// =============================================================================

/// Per-collection watch channels shared by the local store implementations.
#[derive(Debug, Default)]
pub struct FeedHub {
    senders: Mutex<HashMap<CollectionPath, watch::Sender<Vec<Value>>>>,
}

impl FeedHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new batch for `collection`, opening its channel if needed.
    pub fn publish(&self, collection: &CollectionPath, batch: Vec<Value>) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        match senders.get(collection) {
            Some(tx) => {
                tx.send_replace(batch);
            }
            None => {
                let (tx, _rx) = watch::channel(batch);
                senders.insert(collection.clone(), tx);
            }
        }
    }

    /// Subscribe to `collection`. `current` seeds the channel only when no
    /// batch was published yet; an open channel already holds the latest.
    pub fn subscribe(&self, collection: &CollectionPath, current: Vec<Value>) -> Feed {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        match senders.get(collection) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(current);
                senders.insert(collection.clone(), tx);
                rx
            }
        }
    }

    /// Number of collections with an open channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
