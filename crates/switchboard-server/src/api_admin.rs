//! Admin-only reporting endpoints.

use crate::middleware::{require_admin, IdentityContext};
use crate::{with_conn, AppState};
use axum::{extract::Extension, http::StatusCode, response::Json};
use std::sync::Arc;
use switchboard_store as store;
use switchboard_types::TagTaskAssociation;

/// GET /api/admin/tag-task-associations
///
/// Every tag-to-suggested-task association, joined with both names.
pub async fn list_tag_task_associations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
) -> Result<Json<Vec<TagTaskAssociation>>, (StatusCode, String)> {
    require_admin(&identity)?;

    let associations = with_conn(&state.pool, store::list_tag_task_associations).await?;
    Ok(Json(associations))
}
