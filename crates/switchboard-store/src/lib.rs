//! Relational store for the Switchboard platform.
//!
//! Implements persistence for calls, tags, and tasks, plus the three
//! many-to-many associations between them: call-tag links, call-task links
//! with per-call status, and tag-to-suggested-task links.
//!
//! Association mutations are the invariant-bearing core. Each one opens a
//! transaction before its first check and performs check-then-insert inside
//! it, so rejected requests never leave partial writes and duplicate links
//! cannot be created by concurrent callers. Rejections use a three-way
//! taxonomy (`NotFound`, `Conflict`, `Validation`) that callers map onto
//! their own surface.

mod calls;
mod error;
mod links;
mod tags;
mod tasks;

pub use calls::{create_call, get_call, list_calls};
pub use error::StoreError;
pub use links::{
    attach_tags_to_call, attach_task_to_call, link_suggested_task_to_tag, list_call_tags,
    list_call_tasks, list_tag_suggested_tasks, list_tag_task_associations,
    update_call_task_status, TaskRef,
};
pub use tags::{create_tag, delete_tag, get_tag, list_tags, update_tag};
pub use tasks::{
    create_suggested_task, delete_suggested_task, get_task, list_suggested_tasks,
    list_suggested_tasks_for_tags, list_tasks, update_suggested_task,
};
