//! Domain event union broadcast to connected clients.

use serde::{Deserialize, Serialize};

use crate::{Call, CallTask, Tag, Task, TaskStatus};

/// Every event the platform can broadcast, as a closed tagged union.
///
/// Events are serialized to JSON with an `event` discriminator and camelCase
/// payload fields; those are the exact frames carried on the wire, so the
/// variant set cannot grow without both ends changing together. Payloads
/// carry only identifiers and the entities that changed, never a denormalized
/// view of the graph: consumers are expected to refetch, not to patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    /// A tag was created.
    TagCreated {
        /// The new tag.
        tag: Tag,
    },

    /// A tag was renamed.
    TagUpdated {
        /// The tag after the update.
        tag: Tag,
    },

    /// A task was created, either in the suggested catalog or ad hoc for a
    /// call.
    TaskCreated {
        /// The new task.
        task: Task,
    },

    /// A task was renamed.
    TaskUpdated {
        /// The task after the update.
        task: Task,
    },

    /// A call was created.
    CallCreated {
        /// The new call.
        call: Call,
    },

    /// One or more tags were attached to a call.
    CallTagsAdded {
        /// The call the tags were attached to.
        call_id: i64,
        /// Every tag id named in the attach request, including ids that were
        /// already linked.
        tag_ids: Vec<i64>,
    },

    /// A task was attached to a call.
    CallTaskAdded {
        /// The call the task was attached to.
        call_id: i64,
        /// The attached task (newly created or pre-existing).
        task: Task,
    },

    /// The status of a task within a call changed.
    CallTaskStatusUpdated {
        /// The call side of the link.
        call_id: i64,
        /// The task side of the link.
        task_id: i64,
        /// The new status.
        task_status: TaskStatus,
        /// The updated link row.
        call_task: CallTask,
    },

    /// A suggested task was linked to a tag.
    TagSuggestedTaskAdded {
        /// The tag side of the association.
        tag_id: i64,
        /// The suggested task side of the association.
        task_id: i64,
    },
}

impl DomainEvent {
    /// Returns the wire name of this event, as carried in the `event` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TagCreated { .. } => "tagCreated",
            Self::TagUpdated { .. } => "tagUpdated",
            Self::TaskCreated { .. } => "taskCreated",
            Self::TaskUpdated { .. } => "taskUpdated",
            Self::CallCreated { .. } => "callCreated",
            Self::CallTagsAdded { .. } => "callTagsAdded",
            Self::CallTaskAdded { .. } => "callTaskAdded",
            Self::CallTaskStatusUpdated { .. } => "callTaskStatusUpdated",
            Self::TagSuggestedTaskAdded { .. } => "tagSuggestedTaskAdded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: 7,
            name: "Verify Invoice".into(),
            is_suggested: true,
            created_at: "2025-01-01 00:00:00".into(),
            updated_at: "2025-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn event_discriminator_matches_event_type() {
        let event = DomainEvent::CallTagsAdded {
            call_id: 4,
            tag_ids: vec![1, 2],
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["event"], event.event_type());
        assert_eq!(v["event"], "callTagsAdded");
    }

    #[test]
    fn payload_fields_are_camel_case() {
        let event = DomainEvent::CallTaskStatusUpdated {
            call_id: 4,
            task_id: 7,
            task_status: TaskStatus::InProgress,
            call_task: CallTask {
                call_id: 4,
                task_id: 7,
                task_status: TaskStatus::InProgress,
                created_at: "2025-01-01 00:00:00".into(),
                updated_at: "2025-01-02 00:00:00".into(),
            },
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["callId"], 4);
        assert_eq!(v["taskId"], 7);
        assert_eq!(v["taskStatus"], "In Progress");
        assert_eq!(v["callTask"]["taskStatus"], "In Progress");
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = DomainEvent::CallTaskAdded {
            call_id: 9,
            task: sample_task(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_name_fails_to_parse() {
        let err = serde_json::from_str::<DomainEvent>(r#"{"event":"tagDeleted","tagId":1}"#);
        assert!(err.is_err());
    }
}
