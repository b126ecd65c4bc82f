//! Association writes and reads: call-tag, call-task, and tag-task links.
//!
//! Every mutation here is check-then-insert inside one IMMEDIATE
//! transaction. IMMEDIATE takes the write lock up front, so two concurrent
//! callers racing on the same pair serialize: the second one's existence
//! check runs against the first one's committed state and fails cleanly
//! instead of tripping a constraint. An error return always means the
//! transaction rolled back with no partial writes.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use switchboard_types::{
    CallTask, CallTaskWithTask, Tag, TagTask, TagTaskAssociation, Task, TaskStatus,
};

use crate::error::StoreError;
use crate::tags::map_row_to_tag;
use crate::tasks::map_row_to_task;

/// The task side of an attach request: either an existing task or a new
/// ad hoc one created on the spot.
///
/// The two cases are mutually exclusive by construction; callers decide
/// which one a request means before reaching the store.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRef {
    /// Attach the task with this ID.
    Existing(i64),
    /// Create a non-suggested task with this name, then attach it.
    New(String),
}

/// Attaches a set of tags to a call.
///
/// The operation is a set union: tag ids already linked to the call are
/// skipped, never duplicated and never an error. Every id must reference an
/// existing tag; if any does not, nothing is written. Returns the call's
/// full tag list after the union.
pub fn attach_tags_to_call(
    conn: &Connection,
    call_id: i64,
    tag_ids: &[i64],
) -> Result<Vec<Tag>, StoreError> {
    if tag_ids.is_empty() {
        return Err(StoreError::Validation(
            "tagIds must be a non-empty list".into(),
        ));
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    ensure_call_exists(&tx, call_id)?;

    let placeholders = (1..=tag_ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let found: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM tags WHERE id IN ({placeholders})"),
        rusqlite::params_from_iter(tag_ids.iter()),
        |row| row.get(0),
    )?;
    if found != tag_ids.len() as i64 {
        return Err(StoreError::NotFound("one or more tags".into()));
    }

    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO call_tags (call_id, tag_id) VALUES (?1, ?2)")?;
        for &tag_id in tag_ids {
            stmt.execute(params![call_id, tag_id])?;
        }
    }

    let tags = list_call_tags(&tx, call_id)?;
    tx.commit()?;
    Ok(tags)
}

/// Attaches a task to a call.
///
/// With `TaskRef::Existing`, the referenced task must exist and must not
/// already be attached to the call; attaching the same pair twice is a
/// `Conflict` and leaves the existing link (and its status) untouched. With
/// `TaskRef::New`, a non-suggested task is created and linked in the same
/// transaction.
pub fn attach_task_to_call(
    conn: &Connection,
    call_id: i64,
    task: &TaskRef,
    status: TaskStatus,
) -> Result<CallTaskWithTask, StoreError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    ensure_call_exists(&tx, call_id)?;

    let task = match task {
        TaskRef::Existing(task_id) => {
            let task = tx
                .query_row(
                    "SELECT id, name, is_suggested, created_at, updated_at
                     FROM tasks WHERE id = ?1",
                    [task_id],
                    map_row_to_task,
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;

            let already_attached: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM call_tasks WHERE call_id = ?1 AND task_id = ?2)",
                params![call_id, task_id],
                |row| row.get(0),
            )?;
            if already_attached {
                return Err(StoreError::Conflict(format!(
                    "task {task_id} is already attached to call {call_id}"
                )));
            }
            task
        }
        TaskRef::New(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::Validation("task name must not be blank".into()));
            }
            tx.query_row(
                "INSERT INTO tasks (name, is_suggested) VALUES (?1, 0)
                 RETURNING id, name, is_suggested, created_at, updated_at",
                [name],
                map_row_to_task,
            )?
        }
    };

    let link = tx.query_row(
        "INSERT INTO call_tasks (call_id, task_id, task_status) VALUES (?1, ?2, ?3)
         RETURNING call_id, task_id, task_status, created_at, updated_at",
        params![call_id, task.id, status.as_str()],
        map_row_to_call_task,
    )?;

    tx.commit()?;
    Ok(CallTaskWithTask {
        call_id: link.call_id,
        task_id: link.task_id,
        task_status: link.task_status,
        created_at: link.created_at,
        updated_at: link.updated_at,
        task,
    })
}

/// Links a suggested-catalog task to a tag.
///
/// Only suggested tasks may be linked; an existing task outside the catalog
/// is reported the same way as a missing one. Linking the same pair twice
/// is a `Conflict`.
pub fn link_suggested_task_to_tag(
    conn: &Connection,
    tag_id: i64,
    task_id: i64,
) -> Result<TagTask, StoreError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let tag_exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1)",
        [tag_id],
        |row| row.get(0),
    )?;
    if !tag_exists {
        return Err(StoreError::NotFound(format!("tag {tag_id}")));
    }

    let is_suggested: Option<bool> = tx
        .query_row(
            "SELECT is_suggested FROM tasks WHERE id = ?1",
            [task_id],
            |row| row.get(0),
        )
        .optional()?;
    if !matches!(is_suggested, Some(true)) {
        return Err(StoreError::NotFound(format!("suggested task {task_id}")));
    }

    let already_linked: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM tag_tasks WHERE tag_id = ?1 AND task_id = ?2)",
        params![tag_id, task_id],
        |row| row.get(0),
    )?;
    if already_linked {
        return Err(StoreError::Conflict(format!(
            "task {task_id} is already linked to tag {tag_id}"
        )));
    }

    let link = tx.query_row(
        "INSERT INTO tag_tasks (tag_id, task_id) VALUES (?1, ?2)
         RETURNING tag_id, task_id, created_at",
        params![tag_id, task_id],
        |row| {
            Ok(TagTask {
                tag_id: row.get(0)?,
                task_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )?;

    tx.commit()?;
    Ok(link)
}

/// Sets the status of a task within a call.
///
/// Statuses carry no transition rules; any status may replace any other.
/// The single UPDATE doubles as the existence check: zero affected rows
/// means the pair was never linked.
pub fn update_call_task_status(
    conn: &Connection,
    call_id: i64,
    task_id: i64,
    status: TaskStatus,
) -> Result<CallTask, StoreError> {
    conn.query_row(
        "UPDATE call_tasks SET task_status = ?1, updated_at = datetime('now')
         WHERE call_id = ?2 AND task_id = ?3
         RETURNING call_id, task_id, task_status, created_at, updated_at",
        params![status.as_str(), call_id, task_id],
        map_row_to_call_task,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("call task ({call_id}, {task_id})")))
}

/// Lists the tags attached to a call, most recently linked first.
pub fn list_call_tags(conn: &Connection, call_id: i64) -> Result<Vec<Tag>, StoreError> {
    ensure_call_exists(conn, call_id)?;

    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.created_at, t.updated_at
         FROM call_tags ct
         JOIN tags t ON t.id = ct.tag_id
         WHERE ct.call_id = ?1
         ORDER BY ct.created_at DESC, t.id DESC",
    )?;

    let rows = stmt.query_map([call_id], map_row_to_tag)?;
    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

/// Lists the tasks attached to a call, most recently linked first, each
/// joined with the task it points at.
pub fn list_call_tasks(
    conn: &Connection,
    call_id: i64,
) -> Result<Vec<CallTaskWithTask>, StoreError> {
    ensure_call_exists(conn, call_id)?;

    let mut stmt = conn.prepare(
        "SELECT ct.call_id, ct.task_id, ct.task_status, ct.created_at, ct.updated_at,
                t.id, t.name, t.is_suggested, t.created_at, t.updated_at
         FROM call_tasks ct
         JOIN tasks t ON t.id = ct.task_id
         WHERE ct.call_id = ?1
         ORDER BY ct.created_at DESC, ct.task_id DESC",
    )?;

    let rows = stmt.query_map([call_id], |row| {
        let status_str: String = row.get(2)?;
        let task_status = parse_status(2, &status_str)?;
        Ok(CallTaskWithTask {
            call_id: row.get(0)?,
            task_id: row.get(1)?,
            task_status,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            task: Task {
                id: row.get(5)?,
                name: row.get(6)?,
                is_suggested: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
            },
        })
    })?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

/// Lists the suggested tasks linked to a tag, most recently linked first.
pub fn list_tag_suggested_tasks(conn: &Connection, tag_id: i64) -> Result<Vec<Task>, StoreError> {
    let tag_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1)",
        [tag_id],
        |row| row.get(0),
    )?;
    if !tag_exists {
        return Err(StoreError::NotFound(format!("tag {tag_id}")));
    }

    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.is_suggested, t.created_at, t.updated_at
         FROM tag_tasks tt
         JOIN tasks t ON t.id = tt.task_id
         WHERE tt.tag_id = ?1
         ORDER BY tt.created_at DESC, t.id DESC",
    )?;

    let rows = stmt.query_map([tag_id], map_row_to_task)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

/// Lists every tag-task association with both display names, most recent
/// first.
pub fn list_tag_task_associations(
    conn: &Connection,
) -> Result<Vec<TagTaskAssociation>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT tt.tag_id, tt.task_id, tg.name, t.name, tt.created_at
         FROM tag_tasks tt
         JOIN tags tg ON tg.id = tt.tag_id
         JOIN tasks t ON t.id = tt.task_id
         ORDER BY tt.created_at DESC, tt.tag_id DESC, tt.task_id DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(TagTaskAssociation {
            tag_id: row.get(0)?,
            task_id: row.get(1)?,
            tag_name: row.get(2)?,
            task_name: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut associations = Vec::new();
    for row in rows {
        associations.push(row?);
    }
    Ok(associations)
}

fn ensure_call_exists(conn: &Connection, call_id: i64) -> Result<(), StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM calls WHERE id = ?1)",
        [call_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StoreError::NotFound(format!("call {call_id}")));
    }
    Ok(())
}

fn parse_status(column: usize, raw: &str) -> rusqlite::Result<TaskStatus> {
    raw.parse::<TaskStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn map_row_to_call_task(row: &Row) -> rusqlite::Result<CallTask> {
    let status_str: String = row.get(2)?;
    let task_status = parse_status(2, &status_str)?;
    Ok(CallTask {
        call_id: row.get(0)?,
        task_id: row.get(1)?,
        task_status,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
