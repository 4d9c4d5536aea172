//! Shared application state for the store server.
//!
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the backing store behind the [`NoteStore`] trait so the same routes
//! serve the Postgres and in-memory stores.

use std::sync::Arc;

use crate::store::NoteStore;
use crate::store::memory::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NoteStore>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    /// State backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}
