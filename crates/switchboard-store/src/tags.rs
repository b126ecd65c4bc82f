//! Tag persistence and catalog management.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use switchboard_types::Tag;

use crate::error::StoreError;

/// Creates a new tag.
///
/// Tag names are globally unique; a duplicate name is a `Conflict`. The
/// uniqueness check and the insert run in one IMMEDIATE transaction so two
/// concurrent creates of the same name cannot both pass the check.
pub fn create_tag(conn: &Connection, name: &str) -> Result<Tag, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("tag name must not be blank".into()));
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let taken: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    if taken {
        return Err(StoreError::Conflict(format!("tag name '{name}' already exists")));
    }

    let tag = tx.query_row(
        "INSERT INTO tags (name) VALUES (?1)
         RETURNING id, name, created_at, updated_at",
        [name],
        map_row_to_tag,
    )?;

    tx.commit()?;
    Ok(tag)
}

/// Renames an existing tag.
pub fn update_tag(conn: &Connection, tag_id: i64, name: &str) -> Result<Tag, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("tag name must not be blank".into()));
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1)",
        [tag_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StoreError::NotFound(format!("tag {tag_id}")));
    }

    let taken: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?1 AND id != ?2)",
        params![name, tag_id],
        |row| row.get(0),
    )?;
    if taken {
        return Err(StoreError::Conflict(format!("tag name '{name}' already exists")));
    }

    let tag = tx.query_row(
        "UPDATE tags SET name = ?1, updated_at = datetime('now') WHERE id = ?2
         RETURNING id, name, created_at, updated_at",
        params![name, tag_id],
        map_row_to_tag,
    )?;

    tx.commit()?;
    Ok(tag)
}

/// Deletes a tag.
///
/// Cascade rules remove every `call_tags` and `tag_tasks` row that
/// referenced it.
pub fn delete_tag(conn: &Connection, tag_id: i64) -> Result<(), StoreError> {
    let count = conn.execute("DELETE FROM tags WHERE id = ?1", [tag_id])?;
    if count == 0 {
        return Err(StoreError::NotFound(format!("tag {tag_id}")));
    }
    Ok(())
}

/// Retrieves a tag by ID.
pub fn get_tag(conn: &Connection, tag_id: i64) -> Result<Tag, StoreError> {
    conn.query_row(
        "SELECT id, name, created_at, updated_at FROM tags WHERE id = ?1",
        [tag_id],
        map_row_to_tag,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("tag {tag_id}")))
}

/// Lists all tags, newest first.
pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, updated_at
         FROM tags ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt.query_map([], map_row_to_tag)?;
    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

pub(crate) fn map_row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}
