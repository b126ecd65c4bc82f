//! Tag endpoints: catalog CRUD (admin) and suggested-task associations.

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
use switchboard_types::{DomainEvent, Tag, TagTask, Task};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNameRequest {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSuggestedTaskRequest {
    pub task_id: i64,
}

/// POST /api/tags (admin)
pub async fn create_tag_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Json(payload): Json<TagNameRequest>,
) -> Result<Json<Tag>, (StatusCode, String)> {
    require_admin(&identity)?;

    let tag = with_conn(&state.pool, move |conn| {
        store::create_tag(conn, &payload.name)
    })
    .await?;

    state
        .broadcaster
        .publish(DomainEvent::TagCreated { tag: tag.clone() });
    Ok(Json(tag))
}

/// GET /api/tags
pub async fn list_tags_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Tag>>, (StatusCode, String)> {
    let tags = with_conn(&state.pool, store::list_tags).await?;
    Ok(Json(tags))
}

/// GET /api/tags/{tagId}
pub async fn get_tag_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tag_id): Path<i64>,
) -> Result<Json<Tag>, (StatusCode, String)> {
    let tag = with_conn(&state.pool, move |conn| store::get_tag(conn, tag_id)).await?;
    Ok(Json(tag))
}

/// PUT /api/tags/{tagId} (admin)
pub async fn update_tag_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path(tag_id): Path<i64>,
    Json(payload): Json<TagNameRequest>,
) -> Result<Json<Tag>, (StatusCode, String)> {
    require_admin(&identity)?;

    let tag = with_conn(&state.pool, move |conn| {
        store::update_tag(conn, tag_id, &payload.name)
    })
    .await?;

    state
        .broadcaster
        .publish(DomainEvent::TagUpdated { tag: tag.clone() });
    Ok(Json(tag))
}

/// DELETE /api/tags/{tagId} (admin)
///
/// Cascades to call links and suggested-task associations. No event: the
/// event union intentionally has no deletion kinds.
pub async fn delete_tag_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    Path(tag_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&identity)?;

    with_conn(&state.pool, move |conn| store::delete_tag(conn, tag_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/tags/{tagId}/suggested-tasks
pub async fn list_tag_suggested_tasks_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tag_id): Path<i64>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = with_conn(&state.pool, move |conn| {
        store::list_tag_suggested_tasks(conn, tag_id)
    })
    .await?;
    Ok(Json(tasks))
}

/// POST /api/tags/{tagId}/suggested-tasks
///
/// Links an existing suggested task to the tag. Repeats are conflicts,
/// unlike the bulk call-tag attach.
pub async fn link_suggested_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tag_id): Path<i64>,
    Json(payload): Json<LinkSuggestedTaskRequest>,
) -> Result<Json<TagTask>, (StatusCode, String)> {
    let link = with_conn(&state.pool, move |conn| {
        store::link_suggested_task_to_tag(conn, tag_id, payload.task_id)
    })
    .await?;

    state.broadcaster.publish(DomainEvent::TagSuggestedTaskAdded {
        tag_id: link.tag_id,
        task_id: link.task_id,
    });
    Ok(Json(link))
}
