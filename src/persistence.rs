//! Persistence service: fire-and-forget outbound writes.
//!
//! DESIGN
//! ======
//! The board controller mutates its local model first, then hands a
//! [`WriteOp`] to a bounded queue with `try_send` and moves on. It never
//! awaits the store. A background worker drains the queue in order and
//! applies each op to the store.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is logged and dropped: no retry and no local rollback.
//! The optimistic local state stands until the next snapshot delivery
//! reconciles it. A full or closed queue drops the op with a warning.

#[cfg(test)]
#[path = "persistence_test.rs"]
mod persistence_test;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::note::{NoteId, NoteRecord, RecordPatch};
use crate::store::{CollectionPath, NoteStore, StoreError};

pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;

/// One outbound write against the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Create { collection: CollectionPath, record: NoteRecord },
    Update { collection: CollectionPath, id: NoteId, patch: RecordPatch },
    Delete { collection: CollectionPath, id: NoteId },
}

impl WriteOp {
    #[must_use]
    pub fn collection(&self) -> &CollectionPath {
        match self {
            Self::Create { collection, .. } | Self::Update { collection, .. } | Self::Delete { collection, .. } => {
                collection
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> NoteId {
        match self {
            Self::Create { record, .. } => record.id,
            Self::Update { id, .. } | Self::Delete { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Apply this op to `store`.
    ///
    /// # Errors
    ///
    /// Propagates the store's error.
    pub async fn apply(&self, store: &dyn NoteStore) -> Result<(), StoreError> {
        match self {
            Self::Create { collection, record } => store.create(collection, record).await,
            Self::Update { collection, id, patch } => store.update(collection, *id, patch).await,
            Self::Delete { collection, id } => store.delete(collection, *id).await,
        }
    }
}

/// Sending half of the outbound write queue.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::Sender<WriteOp>,
}

impl WriteQueue {
    /// Build a queue without a worker. The caller owns the receiving half.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WriteOp>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Best-effort, non-blocking enqueue.
    ///
    /// Returns `false` when the op was dropped.
    pub fn enqueue(&self, op: WriteOp) -> bool {
        match self.tx.try_send(op) {
            Ok(()) => true,
            Err(TrySendError::Full(op)) => {
                warn!(op = op.kind(), collection = %op.collection(), id = op.id(), "write queue full; dropping write");
                false
            }
            Err(TrySendError::Closed(op)) => {
                warn!(op = op.kind(), collection = %op.collection(), id = op.id(), "write queue closed; dropping write");
                false
            }
        }
    }
}

/// Spawn the write worker and return its queue.
#[must_use]
pub fn spawn_write_worker(store: Arc<dyn NoteStore>, capacity: usize) -> (WriteQueue, JoinHandle<()>) {
    let (queue, rx) = WriteQueue::channel(capacity);
    let handle = tokio::spawn(run_write_worker(store, rx));
    (queue, handle)
}

/// Drain `rx` until every sender is gone, applying ops in order.
pub async fn run_write_worker(store: Arc<dyn NoteStore>, mut rx: mpsc::Receiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op.apply(store.as_ref()).await {
            Ok(()) => debug!(op = op.kind(), collection = %op.collection(), id = op.id(), "write applied"),
            Err(e) => error!(
                op = op.kind(),
                collection = %op.collection(),
                id = op.id(),
                error = %e,
                "write failed; local state left as is"
            ),
        }
    }
    debug!("write worker stopped");
}
