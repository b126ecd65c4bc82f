//! Cache keys and the event-to-invalidation mapping.
//!
//! Every cached query is identified by a [`QueryKey`]: a resource family
//! plus either a single id or the whole collection. [`invalidation_keys`]
//! is the one place that knows which keys each domain event makes stale;
//! the bridge applies it mechanically and never interprets event payloads
//! beyond that.

use serde::{Deserialize, Serialize};
use switchboard_types::DomainEvent;

/// Resource families the cache tracks.
///
/// Association families are keyed by their parent entity: a `CallTag` or
/// `CallTask` entry holds one call's link list, a `TagTaskAssociation`
/// entry holds one tag's associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// Calls.
    Call,
    /// Tags.
    Tag,
    /// All tasks, suggested or not.
    Task,
    /// The suggested catalog view of tasks.
    SuggestedTask,
    /// A call's attached tags.
    CallTag,
    /// A call's attached tasks.
    CallTask,
    /// Tag-to-suggested-task associations.
    TagTaskAssociation,
}

/// What a cached query covers: one entity (or one parent's association
/// list) or the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// A single entity, or the association list of the parent with this id.
    Entity(i64),
    /// The full collection.
    List,
}

/// Identity of one cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    /// The resource family.
    pub resource: Resource,
    /// The covered scope.
    pub scope: Scope,
}

impl QueryKey {
    /// Key for a single entity (or a parent's association list).
    pub fn entity(resource: Resource, id: i64) -> Self {
        Self {
            resource,
            scope: Scope::Entity(id),
        }
    }

    /// Key for a full collection.
    pub fn list(resource: Resource) -> Self {
        Self {
            resource,
            scope: Scope::List,
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            Scope::Entity(id) => write!(f, "{:?}/{id}", self.resource),
            Scope::List => write!(f, "{:?}/LIST", self.resource),
        }
    }
}

/// Maps a domain event to the cache keys it makes stale.
///
/// The mapping is fixed and total: every event kind has an entry, and the
/// compiler keeps it that way when the event union grows. List keys
/// invalidate their whole family (see `QueryCache::invalidate`), so a row
/// like `Tag/LIST` also reaches every cached single-tag entry.
pub fn invalidation_keys(event: &DomainEvent) -> Vec<QueryKey> {
    use Resource::*;

    match event {
        DomainEvent::TagCreated { .. } => vec![QueryKey::list(Tag)],
        DomainEvent::TagUpdated { tag } => vec![
            QueryKey::entity(Tag, tag.id),
            QueryKey::list(Tag),
            QueryKey::list(CallTag),
            QueryKey::list(Call),
        ],
        DomainEvent::TaskCreated { .. } => {
            vec![QueryKey::list(Task), QueryKey::list(SuggestedTask)]
        }
        DomainEvent::TaskUpdated { task } => vec![
            QueryKey::entity(Task, task.id),
            QueryKey::list(Task),
            QueryKey::list(SuggestedTask),
            QueryKey::list(CallTask),
        ],
        DomainEvent::CallCreated { .. } => vec![QueryKey::list(Call)],
        DomainEvent::CallTagsAdded { call_id, .. } => vec![
            QueryKey::entity(CallTag, *call_id),
            QueryKey::entity(Call, *call_id),
        ],
        DomainEvent::CallTaskAdded { call_id, .. } => vec![
            QueryKey::entity(CallTask, *call_id),
            QueryKey::entity(Call, *call_id),
        ],
        DomainEvent::CallTaskStatusUpdated { call_id, .. } => vec![
            QueryKey::entity(CallTask, *call_id),
            QueryKey::entity(Call, *call_id),
        ],
        DomainEvent::TagSuggestedTaskAdded { tag_id, .. } => vec![
            QueryKey::entity(TagTaskAssociation, *tag_id),
            QueryKey::list(TagTaskAssociation),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_types::{CallTask, Tag, Task, TaskStatus};

    fn tag(id: i64) -> Tag {
        Tag {
            id,
            name: "Billing".into(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn task(id: i64) -> Task {
        Task {
            id,
            name: "Verify Invoice".into(),
            is_suggested: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn entity_events_carry_the_entity_id() {
        let keys = invalidation_keys(&DomainEvent::TagUpdated { tag: tag(7) });
        assert!(keys.contains(&QueryKey::entity(Resource::Tag, 7)));
        assert!(keys.contains(&QueryKey::list(Resource::Tag)));

        let keys = invalidation_keys(&DomainEvent::TaskUpdated { task: task(3) });
        assert!(keys.contains(&QueryKey::entity(Resource::Task, 3)));
        assert!(keys.contains(&QueryKey::list(Resource::CallTask)));
    }

    #[test]
    fn call_scoped_events_touch_the_call_and_its_links() {
        let added = DomainEvent::CallTaskAdded {
            call_id: 11,
            task: task(3),
        };
        assert_eq!(
            invalidation_keys(&added),
            vec![
                QueryKey::entity(Resource::CallTask, 11),
                QueryKey::entity(Resource::Call, 11),
            ]
        );

        let status = DomainEvent::CallTaskStatusUpdated {
            call_id: 11,
            task_id: 3,
            task_status: TaskStatus::Completed,
            call_task: CallTask {
                call_id: 11,
                task_id: 3,
                task_status: TaskStatus::Completed,
                created_at: String::new(),
                updated_at: String::new(),
            },
        };
        assert_eq!(invalidation_keys(&status), invalidation_keys(&added));
    }

    #[test]
    fn creation_events_only_touch_lists() {
        for (event, expected) in [
            (
                DomainEvent::TagCreated { tag: tag(1) },
                vec![QueryKey::list(Resource::Tag)],
            ),
            (
                DomainEvent::TaskCreated { task: task(1) },
                vec![
                    QueryKey::list(Resource::Task),
                    QueryKey::list(Resource::SuggestedTask),
                ],
            ),
        ] {
            assert_eq!(invalidation_keys(&event), expected);
        }
    }

    #[test]
    fn suggested_link_event_targets_the_association_family() {
        let keys = invalidation_keys(&DomainEvent::TagSuggestedTaskAdded {
            tag_id: 4,
            task_id: 9,
        });
        assert_eq!(
            keys,
            vec![
                QueryKey::entity(Resource::TagTaskAssociation, 4),
                QueryKey::list(Resource::TagTaskAssociation),
            ]
        );
    }
}
