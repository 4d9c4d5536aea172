//! Router assembly for the store server.
//!
//! SYSTEM CONTEXT
//! ==============
//! REST routes create, patch, delete, and list note records per collection.
//! The websocket feed pushes the full batch of a collection on every change,
//! which is what board clients subscribe to.

pub mod feed;
pub mod records;

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ErrorCode;
use crate::state::AppState;
use crate::store::StoreError;

/// Full application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/records", get(records::list_records).post(records::create_record))
        .route(
            "/api/records/{id}",
            patch(records::patch_record).delete(records::delete_record),
        )
        .route("/api/feed", get(feed::handle_feed))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

pub(crate) fn store_error_to_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::InvalidCollection(_) => StatusCode::BAD_REQUEST,
        StoreError::CorruptRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Http(_) | StoreError::Status { .. } | StoreError::WsConnect(_) | StoreError::WsClosed => {
            StatusCode::BAD_GATEWAY
        }
        StoreError::Serialize(_) | StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body `{ "code": "E_...", "message": "..." }` with the mapped status.
pub(crate) fn error_response(err: &StoreError) -> Response {
    let status = store_error_to_status(err);
    if status.is_server_error() {
        tracing::error!(code = err.error_code(), error = %err, "request failed");
    }
    let body = serde_json::json!({ "code": err.error_code(), "message": err.to_string() });
    (status, Json(body)).into_response()
}
