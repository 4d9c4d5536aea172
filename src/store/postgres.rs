//! Postgres-backed document store.
//!
//! DESIGN
//! ======
//! Each document is one row of `note_records(collection, id, body jsonb)`.
//! Partial updates are a read-modify-write inside a transaction with the
//! row locked (`FOR UPDATE`), so the patch semantics are the same Rust code
//! the in-memory store runs.
//!
//! Feeds are served from an in-process [`FeedHub`]. After every committed
//! write the affected collection is re-read and republished. Writes and
//! their republish are serialized by `write_gate` so batches for one
//! collection are published in commit order.

#[cfg(test)]
#[path = "postgres_test.rs"]
mod postgres_test;

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CollectionPath, Feed, FeedHub, NoteStore, StoreError};
use crate::note::{NoteId, NoteRecord, RecordPatch};

pub struct PgStore {
    pool: PgPool,
    hub: FeedHub,
    write_gate: Mutex<()>,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, hub: FeedHub::new(), write_gate: Mutex::new(()) }
    }

    async fn load(&self, collection: &CollectionPath) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query_as::<_, (Value,)>("SELECT body FROM note_records WHERE collection = $1 ORDER BY id ASC")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(body,)| body).collect())
    }

    async fn republish(&self, collection: &CollectionPath) -> Result<(), StoreError> {
        let batch = self.load(collection).await?;
        debug!(%collection, count = batch.len(), "republishing collection");
        self.hub.publish(collection, batch);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NoteStore for PgStore {
    async fn create(&self, collection: &CollectionPath, record: &NoteRecord) -> Result<(), StoreError> {
        let body = serde_json::to_value(record)?;
        let _gate = self.write_gate.lock().await;

        sqlx::query(
            "INSERT INTO note_records (collection, id, body)
             VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body, updated_at = now()",
        )
        .bind(collection.as_str())
        .bind(record.id)
        .bind(&body)
        .execute(&self.pool)
        .await?;

        self.republish(collection).await
    }

    async fn update(&self, collection: &CollectionPath, id: NoteId, patch: &RecordPatch) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (Value,)>(
            "SELECT body FROM note_records WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((mut body,)) = row else {
            return Err(StoreError::NotFound { collection: collection.to_string(), id });
        };
        if !patch.apply_to(&mut body) {
            return Err(StoreError::CorruptRecord { collection: collection.to_string(), id });
        }

        sqlx::query("UPDATE note_records SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .bind(&body)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.republish(collection).await
    }

    async fn delete(&self, collection: &CollectionPath, id: NoteId) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let result = sqlx::query("DELETE FROM note_records WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(());
        }
        self.republish(collection).await
    }

    async fn snapshot(&self, collection: &CollectionPath) -> Result<Vec<Value>, StoreError> {
        self.load(collection).await
    }

    async fn subscribe(&self, collection: &CollectionPath) -> Result<Feed, StoreError> {
        let _gate = self.write_gate.lock().await;
        let current = self.load(collection).await?;
        Ok(self.hub.subscribe(collection, current))
    }
}
