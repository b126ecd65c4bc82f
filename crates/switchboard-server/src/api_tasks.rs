//! Task endpoints: the suggested catalog (admin-managed) and task reads.

use crate::middleware::{require_admin, IdentityContext};
use crate::{with_conn, AppState};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_store as store;
use switchboard_types::{DomainEvent, Task};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNameRequest {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksByTagsRequest {
    pub tag_ids: Vec<i64>,
}

/// GET /api/tasks (admin)
///
/// The full task table, ad hoc tasks included; regular users only see the
/// suggested catalog.
pub async fn list_tasks_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    require_admin(&identity)?;

    let tasks = with_conn(&state.pool, store::list_tasks).await?;
    Ok(Json(tasks))
}

/// GET /api/tasks/{taskId} (admin)
pub async fn get_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, (StatusCode, String)> {
    require_admin(&identity)?;

    let task = with_conn(&state.pool, move |conn| store::get_task(conn, task_id)).await?;
    Ok(Json(task))
}

/// POST /api/tasks/suggested (admin)
pub async fn create_suggested_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Json(payload): Json<TaskNameRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    require_admin(&identity)?;

    let task = with_conn(&state.pool, move |conn| {
        store::create_suggested_task(conn, &payload.name)
    })
    .await?;

    state
        .broadcaster
        .publish(DomainEvent::TaskCreated { task: task.clone() });
    Ok(Json(task))
}

/// GET /api/tasks/suggested
pub async fn list_suggested_tasks_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = with_conn(&state.pool, store::list_suggested_tasks).await?;
    Ok(Json(tasks))
}

/// PUT /api/tasks/suggested/{taskId} (admin)
pub async fn update_suggested_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path(task_id): Path<i64>,
    Json(payload): Json<TaskNameRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    require_admin(&identity)?;

    let task = with_conn(&state.pool, move |conn| {
        store::update_suggested_task(conn, task_id, &payload.name)
    })
    .await?;

    state
        .broadcaster
        .publish(DomainEvent::TaskUpdated { task: task.clone() });
    Ok(Json(task))
}

/// DELETE /api/tasks/suggested/{taskId} (admin)
pub async fn delete_suggested_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&identity)?;

    with_conn(&state.pool, move |conn| {
        store::delete_suggested_task(conn, task_id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tasks/suggested/by-tags
///
/// The deduplicated union of suggested tasks linked to any of the given
/// tags; the shape call tagging uses to offer follow-ups.
pub async fn suggested_tasks_by_tags_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TasksByTagsRequest>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = with_conn(&state.pool, move |conn| {
        store::list_suggested_tasks_for_tags(conn, &payload.tag_ids)
    })
    .await?;
    Ok(Json(tasks))
}
