//! Shared types and constants for the Switchboard platform.
//!
//! This crate provides the foundational types used across all Switchboard
//! crates: the call/tag/task entities, the task status code, the caller
//! role, and the domain event union broadcast to connected clients.
//!
//! No crate in the workspace depends on anything *except* `switchboard-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use serde::{Deserialize, Serialize};

mod event;
pub use event::DomainEvent;

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Auto-incremented row ID.
    pub id: i64,
    /// Display name of the call.
    pub name: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// A label that can be attached to calls and carry suggested tasks.
///
/// Tag names are globally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Auto-incremented row ID.
    pub id: i64,
    /// Unique display name.
    pub name: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// A unit of follow-up work.
///
/// Suggested tasks (`is_suggested = true`) form a reusable catalog that can
/// be linked to tags; non-suggested tasks exist only through the call they
/// were created for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Auto-incremented row ID.
    pub id: i64,
    /// Display name of the task.
    pub name: String,
    /// Whether this task belongs to the reusable suggested catalog.
    pub is_suggested: bool,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// A task attached to a call, with its per-call completion status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTask {
    /// The call side of the link.
    pub call_id: i64,
    /// The task side of the link.
    pub task_id: i64,
    /// Completion status of the task within this call.
    pub task_status: TaskStatus,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

/// A call-task link joined with the task it points at.
///
/// This is the shape returned when listing a call's tasks, so consumers get
/// the task name without a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTaskWithTask {
    /// The call side of the link.
    pub call_id: i64,
    /// The task side of the link.
    pub task_id: i64,
    /// Completion status of the task within this call.
    pub task_status: TaskStatus,
    /// ISO 8601 creation timestamp of the link.
    pub created_at: String,
    /// ISO 8601 last-update timestamp of the link.
    pub updated_at: String,
    /// The linked task.
    pub task: Task,
}

/// A tag-to-suggested-task association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagTask {
    /// The tag side of the association.
    pub tag_id: i64,
    /// The suggested task side of the association.
    pub task_id: i64,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}

/// A tag-to-suggested-task association joined with both display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagTaskAssociation {
    /// The tag side of the association.
    pub tag_id: i64,
    /// The suggested task side of the association.
    pub task_id: i64,
    /// Display name of the tag.
    pub tag_name: String,
    /// Display name of the task.
    pub task_name: String,
    /// ISO 8601 creation timestamp of the association.
    pub created_at: String,
}

/// Completion status of a task within a call.
///
/// There is no enforced ordering between statuses; any status may be set
/// from any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[serde(rename = "Open")]
    Open,
    /// Being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Done.
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    /// Returns the canonical string label for this status.
    ///
    /// This is the exact form stored in the database and sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "In Progress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown task status string.
#[derive(Debug, Clone)]
pub struct ParseTaskStatusError(pub String);

impl std::fmt::Display for ParseTaskStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown task status: {}", self.0)
    }
}

impl std::error::Error for ParseTaskStatusError {}

/// Caller role attached to each authenticated request.
///
/// Roles gate the catalog-management surface (tag and suggested-task CRUD);
/// they never affect event delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Regular authenticated caller.
    #[serde(rename = "user")]
    User,
    /// Catalog administrator.
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    /// Returns the canonical string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Whether this role may manage the tag and suggested-task catalog.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone)]
pub struct ParseRoleError(pub String);

impl std::fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn task_status_round_trip() {
        for status in [TaskStatus::Open, TaskStatus::InProgress, TaskStatus::Completed] {
            let s = status.as_str();
            assert_eq!(TaskStatus::from_str(s).unwrap(), status);
        }
    }

    #[test]
    fn task_status_invalid() {
        assert!(TaskStatus::from_str("open").is_err());
        assert!(TaskStatus::from_str("InProgress").is_err());
        assert!(TaskStatus::from_str("").is_err());
    }

    #[test]
    fn task_status_default_is_open() {
        assert_eq!(TaskStatus::default(), TaskStatus::Open);
    }

    #[test]
    fn task_status_serde_uses_wire_labels() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let back: TaskStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(back, TaskStatus::Completed);
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert!(Role::from_str("Admin").is_err());
        assert!(!Role::User.is_admin());
        assert!(Role::Admin.is_admin());
    }

    #[test]
    fn entities_serialize_camel_case() {
        let task = Task {
            id: 3,
            name: "Verify Invoice".into(),
            is_suggested: true,
            created_at: "2025-01-01 00:00:00".into(),
            updated_at: "2025-01-01 00:00:00".into(),
        };
        let v = serde_json::to_value(&task).unwrap();
        assert_eq!(v["isSuggested"], true);
        assert_eq!(v["createdAt"], "2025-01-01 00:00:00");
    }
}
