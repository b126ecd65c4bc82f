//! Call endpoints: entity CRUD plus the call-side junction operations.

use crate::{with_conn, AppState};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_store::{self as store, TaskRef};
use switchboard_types::{Call, CallTask, CallTaskWithTask, DomainEvent, Tag, TaskStatus};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachTagsRequest {
    pub tag_ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachTaskRequest {
    pub task_id: Option<i64>,
    pub task_name: Option<String>,
    pub task_status: Option<TaskStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskStatusRequest {
    pub task_status: TaskStatus,
}

/// POST /api/calls
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateCallRequest>,
) -> Result<Json<Call>, (StatusCode, String)> {
    let call = with_conn(&state.pool, move |conn| {
        store::create_call(conn, &payload.name)
    })
    .await?;

    state.broadcaster.publish(DomainEvent::CallCreated {
        call: call.clone(),
    });
    Ok(Json(call))
}

/// GET /api/calls
pub async fn list_calls_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Call>>, (StatusCode, String)> {
    let calls = with_conn(&state.pool, store::list_calls).await?;
    Ok(Json(calls))
}

/// GET /api/calls/{callId}
pub async fn get_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<i64>,
) -> Result<Json<Call>, (StatusCode, String)> {
    let call = with_conn(&state.pool, move |conn| store::get_call(conn, call_id)).await?;
    Ok(Json(call))
}

/// GET /api/calls/{callId}/tags
pub async fn list_call_tags_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<i64>,
) -> Result<Json<Vec<Tag>>, (StatusCode, String)> {
    let tags = with_conn(&state.pool, move |conn| {
        store::list_call_tags(conn, call_id)
    })
    .await?;
    Ok(Json(tags))
}

/// POST /api/calls/{callId}/tags
///
/// Attaches every requested tag to the call as a set union; ids already
/// linked are skipped. The response is the call's full tag list.
pub async fn attach_tags_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<i64>,
    Json(payload): Json<AttachTagsRequest>,
) -> Result<Json<Vec<Tag>>, (StatusCode, String)> {
    let tag_ids = payload.tag_ids.clone();
    let tags = with_conn(&state.pool, move |conn| {
        store::attach_tags_to_call(conn, call_id, &payload.tag_ids)
    })
    .await?;

    state
        .broadcaster
        .publish(DomainEvent::CallTagsAdded { call_id, tag_ids });
    Ok(Json(tags))
}

/// GET /api/calls/{callId}/tasks
pub async fn list_call_tasks_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<i64>,
) -> Result<Json<Vec<CallTaskWithTask>>, (StatusCode, String)> {
    let tasks = with_conn(&state.pool, move |conn| {
        store::list_call_tasks(conn, call_id)
    })
    .await?;
    Ok(Json(tasks))
}

/// POST /api/calls/{callId}/tasks
///
/// Exactly one of `taskId` (attach existing) and `taskName` (create an ad
/// hoc task and attach it) selects the task; sending both or neither is
/// rejected before the store is touched.
pub async fn attach_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<i64>,
    Json(payload): Json<AttachTaskRequest>,
) -> Result<Json<CallTaskWithTask>, (StatusCode, String)> {
    let task_ref = match (payload.task_id, payload.task_name) {
        (Some(id), None) => TaskRef::Existing(id),
        (None, Some(name)) => TaskRef::New(name),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "exactly one of taskId and taskName is required".to_string(),
            ))
        }
    };
    let status = payload.task_status.unwrap_or_default();

    let linked = with_conn(&state.pool, move |conn| {
        store::attach_task_to_call(conn, call_id, &task_ref, status)
    })
    .await?;

    state.broadcaster.publish(DomainEvent::CallTaskAdded {
        call_id,
        task: linked.task.clone(),
    });
    Ok(Json(linked))
}

/// PUT /api/calls/{callId}/tasks/{taskId}
pub async fn update_call_task_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((call_id, task_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateTaskStatusRequest>,
) -> Result<Json<CallTask>, (StatusCode, String)> {
    let status = payload.task_status;
    let call_task = with_conn(&state.pool, move |conn| {
        store::update_call_task_status(conn, call_id, task_id, status)
    })
    .await?;

    state.broadcaster.publish(DomainEvent::CallTaskStatusUpdated {
        call_id,
        task_id,
        task_status: call_task.task_status,
        call_task: call_task.clone(),
    });
    Ok(Json(call_task))
}
