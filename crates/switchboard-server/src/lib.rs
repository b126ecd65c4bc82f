//! Switchboard server library logic.

pub mod api_admin;
pub mod api_calls;
pub mod api_events;
pub mod api_tags;
pub mod api_tasks;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_db::DbPool;
use switchboard_events::EventBroadcaster;
use switchboard_store::StoreError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Registry of live event-stream subscribers.
    ///
    /// Created once at startup and handed to every handler through the
    /// state; publishing to it never blocks and never fails a mutation.
    pub broadcaster: EventBroadcaster,
}

/// Maps a [`StoreError`] to an HTTP response, logging database failures.
///
/// `NotFound` → 404, `Conflict` → 409, `Validation` → 400, everything
/// SQLite-shaped → 500 with the detail kept server-side.
pub(crate) fn store_err_to_response(err: StoreError) -> (StatusCode, String) {
    let status = match &err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::Database(e) => {
            tracing::error!(error = %e, "store operation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            );
        }
    };
    (status, err.to_string())
}

/// Runs a store operation on a pooled connection via `spawn_blocking`.
///
/// rusqlite is synchronous; every handler goes through here so request
/// tasks never hold the runtime hostage during SQLite waits.
pub(crate) async fn with_conn<T, F>(pool: &DbPool, op: F) -> Result<T, (StatusCode, String)>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "connection checkout failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database unavailable".to_string(),
            )
        })?;
        op(&conn).map_err(store_err_to_response)
    })
    .await
    .map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "blocking task failed".to_string(),
        )
    })?
}

/// Maximum request body size (1 MiB). Every payload here is a name or a
/// handful of ids.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/calls",
            post(api_calls::create_call_handler).get(api_calls::list_calls_handler),
        )
        .route("/api/calls/{callId}", get(api_calls::get_call_handler))
        .route(
            "/api/calls/{callId}/tags",
            get(api_calls::list_call_tags_handler).post(api_calls::attach_tags_handler),
        )
        .route(
            "/api/calls/{callId}/tasks",
            get(api_calls::list_call_tasks_handler).post(api_calls::attach_task_handler),
        )
        .route(
            "/api/calls/{callId}/tasks/{taskId}",
            put(api_calls::update_call_task_status_handler),
        )
        .route(
            "/api/tags",
            post(api_tags::create_tag_handler).get(api_tags::list_tags_handler),
        )
        .route(
            "/api/tags/{tagId}",
            get(api_tags::get_tag_handler)
                .put(api_tags::update_tag_handler)
                .delete(api_tags::delete_tag_handler),
        )
        .route(
            "/api/tags/{tagId}/suggested-tasks",
            get(api_tags::list_tag_suggested_tasks_handler)
                .post(api_tags::link_suggested_task_handler),
        )
        .route("/api/tasks", get(api_tasks::list_tasks_handler))
        .route("/api/tasks/{taskId}", get(api_tasks::get_task_handler))
        .route(
            "/api/tasks/suggested",
            post(api_tasks::create_suggested_task_handler)
                .get(api_tasks::list_suggested_tasks_handler),
        )
        .route(
            "/api/tasks/suggested/{taskId}",
            put(api_tasks::update_suggested_task_handler)
                .delete(api_tasks::delete_suggested_task_handler),
        )
        .route(
            "/api/tasks/suggested/by-tags",
            post(api_tasks::suggested_tasks_by_tags_handler),
        )
        .route(
            "/api/admin/tag-task-associations",
            get(api_admin::list_tag_task_associations_handler),
        )
        .layer(axum::middleware::from_fn(middleware::role_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/events/stream", get(api_events::get_event_stream_handler))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
