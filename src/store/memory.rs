//! In-process document store.
//!
//! Documents are kept per collection in id order behind a single lock.
//! Every write republishes the affected collection while the write lock is
//! still held, so feed deliveries for one collection are never reordered.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tokio::sync::RwLock;

use super::{CollectionPath, Feed, FeedHub, NoteStore, StoreError};
use crate::note::{NoteId, NoteRecord, RecordPatch};

type Collection = BTreeMap<NoteId, Value>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionPath, Collection>>,
    hub: FeedHub,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an arbitrary JSON document, bypassing record validation.
    /// Snapshot readers are expected to filter what they cannot parse.
    pub async fn insert_raw(&self, collection: &CollectionPath, id: NoteId, doc: Value) {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.clone()).or_default();
        docs.insert(id, doc);
        self.hub.publish(collection, batch_of(docs));
    }

    /// Fetch one stored document.
    pub async fn get(&self, collection: &CollectionPath, id: NoteId) -> Option<Value> {
        let collections = self.collections.read().await;
        collections.get(collection).and_then(|docs| docs.get(&id).cloned())
    }
}

fn batch_of(docs: &Collection) -> Vec<Value> {
    docs.values().cloned().collect()
}

#[async_trait::async_trait]
impl NoteStore for MemoryStore {
    async fn create(&self, collection: &CollectionPath, record: &NoteRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record)?;
        self.insert_raw(collection, record.id, doc).await;
        Ok(())
    }

    async fn update(&self, collection: &CollectionPath, id: NoteId, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let not_found = || StoreError::NotFound { collection: collection.to_string(), id };
        let docs = collections.get_mut(collection).ok_or_else(not_found)?;
        let doc = docs.get_mut(&id).ok_or_else(not_found)?;
        if !patch.apply_to(doc) {
            return Err(StoreError::CorruptRecord { collection: collection.to_string(), id });
        }
        self.hub.publish(collection, batch_of(docs));
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: NoteId) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(());
        };
        if docs.remove(&id).is_some() {
            self.hub.publish(collection, batch_of(docs));
        }
        Ok(())
    }

    async fn snapshot(&self, collection: &CollectionPath) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(batch_of).unwrap_or_default())
    }

    async fn subscribe(&self, collection: &CollectionPath) -> Result<Feed, StoreError> {
        // Hold the read lock so no write can slip between the read and the
        // channel registration.
        let collections = self.collections.read().await;
        let current = collections.get(collection).map(batch_of).unwrap_or_default();
        Ok(self.hub.subscribe(collection, current))
    }
}
