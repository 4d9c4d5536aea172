//! Record routes: list, create, patch, delete within one collection.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

use super::error_response;
use crate::note::{NoteId, NoteRecord, RecordPatch};
use crate::state::AppState;
use crate::store::CollectionPath;

#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    pub collection: String,
}

impl CollectionQuery {
    fn path(&self) -> Result<CollectionPath, Response> {
        CollectionPath::parse(&self.collection).map_err(|e| error_response(&e))
    }
}

/// `GET /api/records?collection=..`: current batch of the collection.
pub async fn list_records(State(state): State<AppState>, Query(query): Query<CollectionQuery>) -> Response {
    let collection = match query.path() {
        Ok(c) => c,
        Err(response) => return response,
    };
    match state.store.snapshot(&collection).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/records?collection=..`: create or replace a record.
pub async fn create_record(
    State(state): State<AppState>,
    Query(query): Query<CollectionQuery>,
    Json(record): Json<NoteRecord>,
) -> Response {
    let collection = match query.path() {
        Ok(c) => c,
        Err(response) => return response,
    };
    match state.store.create(&collection, &record).await {
        Ok(()) => {
            debug!(%collection, id = record.id, "record created");
            (StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `PATCH /api/records/{id}?collection=..`: partial update.
pub async fn patch_record(
    State(state): State<AppState>,
    Path(id): Path<NoteId>,
    Query(query): Query<CollectionQuery>,
    Json(patch): Json<RecordPatch>,
) -> Response {
    let collection = match query.path() {
        Ok(c) => c,
        Err(response) => return response,
    };
    match state.store.update(&collection, id, &patch).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `DELETE /api/records/{id}?collection=..`: idempotent delete.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<NoteId>,
    Query(query): Query<CollectionQuery>,
) -> Response {
    let collection = match query.path() {
        Ok(c) => c,
        Err(response) => return response,
    };
    match state.store.delete(&collection, id).await {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => error_response(&e),
    }
}
