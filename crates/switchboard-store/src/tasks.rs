//! Task persistence: the suggested catalog and ad hoc call tasks.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use switchboard_types::Task;

use crate::error::StoreError;

/// Creates a new suggested-catalog task.
pub fn create_suggested_task(conn: &Connection, name: &str) -> Result<Task, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("task name must not be blank".into()));
    }

    let task = conn.query_row(
        "INSERT INTO tasks (name, is_suggested) VALUES (?1, 1)
         RETURNING id, name, is_suggested, created_at, updated_at",
        [name],
        map_row_to_task,
    )?;
    Ok(task)
}

/// Renames a suggested-catalog task.
///
/// Rejects tasks outside the catalog: ad hoc call tasks are not editable
/// through the catalog surface.
pub fn update_suggested_task(
    conn: &Connection,
    task_id: i64,
    name: &str,
) -> Result<Task, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("task name must not be blank".into()));
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let is_suggested: Option<bool> = tx
        .query_row(
            "SELECT is_suggested FROM tasks WHERE id = ?1",
            [task_id],
            |row| row.get(0),
        )
        .optional()?;
    match is_suggested {
        None => return Err(StoreError::NotFound(format!("task {task_id}"))),
        Some(false) => {
            return Err(StoreError::Validation(format!(
                "task {task_id} is not a suggested task"
            )))
        }
        Some(true) => {}
    }

    let task = tx.query_row(
        "UPDATE tasks SET name = ?1, updated_at = datetime('now') WHERE id = ?2
         RETURNING id, name, is_suggested, created_at, updated_at",
        params![name, task_id],
        map_row_to_task,
    )?;

    tx.commit()?;
    Ok(task)
}

/// Deletes a suggested-catalog task.
///
/// Cascade rules remove every `call_tasks` and `tag_tasks` row that
/// referenced it.
pub fn delete_suggested_task(conn: &Connection, task_id: i64) -> Result<(), StoreError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let is_suggested: Option<bool> = tx
        .query_row(
            "SELECT is_suggested FROM tasks WHERE id = ?1",
            [task_id],
            |row| row.get(0),
        )
        .optional()?;
    match is_suggested {
        None => return Err(StoreError::NotFound(format!("task {task_id}"))),
        Some(false) => {
            return Err(StoreError::Validation(format!(
                "task {task_id} is not a suggested task"
            )))
        }
        Some(true) => {}
    }

    tx.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
    tx.commit()?;
    Ok(())
}

/// Retrieves a task by ID.
pub fn get_task(conn: &Connection, task_id: i64) -> Result<Task, StoreError> {
    conn.query_row(
        "SELECT id, name, is_suggested, created_at, updated_at FROM tasks WHERE id = ?1",
        [task_id],
        map_row_to_task,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))
}

/// Lists every task, suggested or not, newest first.
pub fn list_tasks(conn: &Connection) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, is_suggested, created_at, updated_at
         FROM tasks ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt.query_map([], map_row_to_task)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

/// Lists the suggested catalog, newest first.
pub fn list_suggested_tasks(conn: &Connection) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, is_suggested, created_at, updated_at
         FROM tasks WHERE is_suggested = 1 ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt.query_map([], map_row_to_task)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

/// Lists the deduplicated union of suggested tasks linked to any of the
/// given tags, newest first.
///
/// An empty tag set yields an empty list rather than an error.
pub fn list_suggested_tasks_for_tags(
    conn: &Connection,
    tag_ids: &[i64],
) -> Result<Vec<Task>, StoreError> {
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (1..=tag_ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT DISTINCT t.id, t.name, t.is_suggested, t.created_at, t.updated_at
         FROM tasks t
         JOIN tag_tasks tt ON tt.task_id = t.id
         WHERE tt.tag_id IN ({placeholders})
         ORDER BY t.created_at DESC, t.id DESC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(tag_ids.iter()), map_row_to_task)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

pub(crate) fn map_row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        is_suggested: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
