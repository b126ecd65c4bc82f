//! Typed HTTP client for the Switchboard API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use switchboard_types::{
    Call, CallTask, CallTaskWithTask, Role, Tag, TagTask, TagTaskAssociation, Task, TaskStatus,
};

use crate::keys::{QueryKey, Resource, Scope};

/// Header carrying the caller's role on every request.
pub const ROLE_HEADER: &str = "x-switchboard-role";

/// Errors surfaced by API calls.
///
/// Cloneable because one fetch result fans out to every reader joined on
/// it, and failed mutations retain their error in client state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

fn status_error(status: reqwest::StatusCode, message: String) -> ApiError {
    // Server bodies repeat the prefix the variant's Display re-adds.
    fn strip(message: String, prefix: &str) -> String {
        match message.strip_prefix(prefix) {
            Some(rest) => rest.to_string(),
            None => message,
        }
    }

    match status {
        reqwest::StatusCode::NOT_FOUND => ApiError::NotFound(strip(message, "not found: ")),
        reqwest::StatusCode::CONFLICT => ApiError::Conflict(strip(message, "conflict: ")),
        reqwest::StatusCode::BAD_REQUEST => {
            ApiError::Validation(strip(message, "validation failed: "))
        }
        reqwest::StatusCode::FORBIDDEN => ApiError::Forbidden(strip(message, "forbidden: ")),
        _ if message.is_empty() => ApiError::Server(status.to_string()),
        _ => ApiError::Server(message),
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(status_error(status, message))
}

/// Fetches the payload behind a cache key.
///
/// The cache calls this on miss and on refetch; [`ApiClient`] implements
/// it against the HTTP API, tests swap in counting stubs.
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: QueryKey) -> Result<Value, ApiError>;
}

/// Body for attaching a task to a call.
///
/// Exactly one of `task_id` and `task_name` must be set; the server
/// rejects anything else.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachTaskBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,
}

impl AttachTaskBody {
    /// Attach an existing task by id.
    pub fn existing(task_id: i64) -> Self {
        Self {
            task_id: Some(task_id),
            task_name: None,
            task_status: None,
        }
    }

    /// Create a fresh ad hoc task and attach it.
    pub fn new_task(name: impl Into<String>) -> Self {
        Self {
            task_id: None,
            task_name: Some(name.into()),
            task_status: None,
        }
    }

    /// Override the initial status (defaults to Open on the server).
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task_status = Some(status);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NameBody<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TagIdsBody<'a> {
    tag_ids: &'a [i64],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    task_status: TaskStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskIdBody {
    task_id: i64,
}

/// Client for the Switchboard HTTP API.
///
/// Holds a connection-pooling [`reqwest::Client`]; cloning shares the
/// pool. The configured role rides along on every request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    role: Role,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, role: Role) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            role,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(self.url(path))
            .header(ROLE_HEADER, self.role.as_str())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let response = self
            .http
            .post(self.url(path))
            .header(ROLE_HEADER, self.role.as_str())
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let response = self
            .http
            .put(self.url(path))
            .header(ROLE_HEADER, self.role.as_str())
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(path))
            .header(ROLE_HEADER, self.role.as_str())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    // Reads.

    pub async fn list_calls(&self) -> Result<Vec<Call>, ApiError> {
        self.get_json("/api/calls").await
    }

    pub async fn get_call(&self, id: i64) -> Result<Call, ApiError> {
        self.get_json(&format!("/api/calls/{id}")).await
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.get_json("/api/tags").await
    }

    pub async fn get_tag(&self, id: i64) -> Result<Tag, ApiError> {
        self.get_json(&format!("/api/tags/{id}")).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.get_json("/api/tasks").await
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, ApiError> {
        self.get_json(&format!("/api/tasks/{id}")).await
    }

    pub async fn list_suggested_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.get_json("/api/tasks/suggested").await
    }

    /// Suggested tasks linked to any of the given tags, deduplicated.
    pub async fn suggested_tasks_by_tags(&self, tag_ids: &[i64]) -> Result<Vec<Task>, ApiError> {
        self.post_json("/api/tasks/suggested/by-tags", &TagIdsBody { tag_ids })
            .await
    }

    pub async fn list_call_tags(&self, call_id: i64) -> Result<Vec<Tag>, ApiError> {
        self.get_json(&format!("/api/calls/{call_id}/tags")).await
    }

    pub async fn list_call_tasks(&self, call_id: i64) -> Result<Vec<CallTaskWithTask>, ApiError> {
        self.get_json(&format!("/api/calls/{call_id}/tasks")).await
    }

    pub async fn list_tag_suggested_tasks(&self, tag_id: i64) -> Result<Vec<Task>, ApiError> {
        self.get_json(&format!("/api/tags/{tag_id}/suggested-tasks"))
            .await
    }

    /// Admin-only: every tag/suggested-task association with names resolved.
    pub async fn list_tag_task_associations(&self) -> Result<Vec<TagTaskAssociation>, ApiError> {
        self.get_json("/api/admin/tag-task-associations").await
    }

    // Mutations.

    pub async fn create_call(&self, name: &str) -> Result<Call, ApiError> {
        self.post_json("/api/calls", &NameBody { name }).await
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag, ApiError> {
        self.post_json("/api/tags", &NameBody { name }).await
    }

    pub async fn update_tag(&self, id: i64, name: &str) -> Result<Tag, ApiError> {
        self.put_json(&format!("/api/tags/{id}"), &NameBody { name })
            .await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/tags/{id}")).await
    }

    pub async fn create_suggested_task(&self, name: &str) -> Result<Task, ApiError> {
        self.post_json("/api/tasks/suggested", &NameBody { name })
            .await
    }

    pub async fn update_suggested_task(&self, id: i64, name: &str) -> Result<Task, ApiError> {
        self.put_json(&format!("/api/tasks/suggested/{id}"), &NameBody { name })
            .await
    }

    pub async fn delete_suggested_task(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/tasks/suggested/{id}")).await
    }

    /// Attach tags to a call; returns the call's full tag list.
    pub async fn attach_tags_to_call(
        &self,
        call_id: i64,
        tag_ids: &[i64],
    ) -> Result<Vec<Tag>, ApiError> {
        self.post_json(
            &format!("/api/calls/{call_id}/tags"),
            &TagIdsBody { tag_ids },
        )
        .await
    }

    pub async fn attach_task_to_call(
        &self,
        call_id: i64,
        body: &AttachTaskBody,
    ) -> Result<CallTaskWithTask, ApiError> {
        self.post_json(&format!("/api/calls/{call_id}/tasks"), body)
            .await
    }

    pub async fn update_call_task_status(
        &self,
        call_id: i64,
        task_id: i64,
        task_status: TaskStatus,
    ) -> Result<CallTask, ApiError> {
        self.put_json(
            &format!("/api/calls/{call_id}/tasks/{task_id}"),
            &StatusBody { task_status },
        )
        .await
    }

    pub async fn link_suggested_task_to_tag(
        &self,
        tag_id: i64,
        task_id: i64,
    ) -> Result<TagTask, ApiError> {
        self.post_json(
            &format!("/api/tags/{tag_id}/suggested-tasks"),
            &TaskIdBody { task_id },
        )
        .await
    }
}

/// Resolves a cache key to the endpoint serving it.
///
/// Association families are keyed by parent, so their only collection
/// endpoint is the admin association dump; the other list scopes have no
/// backing route and asking for one is a programming error.
fn endpoint_for(key: QueryKey) -> Result<String, ApiError> {
    use Resource::*;

    Ok(match (key.resource, key.scope) {
        (Call, Scope::List) => "/api/calls".to_string(),
        (Call, Scope::Entity(id)) => format!("/api/calls/{id}"),
        (Tag, Scope::List) => "/api/tags".to_string(),
        (Tag, Scope::Entity(id)) => format!("/api/tags/{id}"),
        (Task, Scope::List) => "/api/tasks".to_string(),
        (Task, Scope::Entity(id)) => format!("/api/tasks/{id}"),
        (SuggestedTask, Scope::List) => "/api/tasks/suggested".to_string(),
        (CallTag, Scope::Entity(id)) => format!("/api/calls/{id}/tags"),
        (CallTask, Scope::Entity(id)) => format!("/api/calls/{id}/tasks"),
        (TagTaskAssociation, Scope::Entity(id)) => format!("/api/tags/{id}/suggested-tasks"),
        (TagTaskAssociation, Scope::List) => "/api/admin/tag-task-associations".to_string(),
        (SuggestedTask, Scope::Entity(_)) | (CallTag, Scope::List) | (CallTask, Scope::List) => {
            return Err(ApiError::Validation(format!(
                "no endpoint serves cache key {key}"
            )))
        }
    })
}

#[async_trait]
impl QueryFetcher for ApiClient {
    async fn fetch(&self, key: QueryKey) -> Result<Value, ApiError> {
        let path = endpoint_for(key)?;
        self.get_json(&path).await
    }
}
