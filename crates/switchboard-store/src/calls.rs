//! Call persistence.

use rusqlite::{Connection, OptionalExtension, Row};
use switchboard_types::Call;

use crate::error::StoreError;

/// Creates a new call.
pub fn create_call(conn: &Connection, name: &str) -> Result<Call, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("call name must not be blank".into()));
    }

    let call = conn.query_row(
        "INSERT INTO calls (name) VALUES (?1)
         RETURNING id, name, created_at, updated_at",
        [name],
        map_row_to_call,
    )?;
    Ok(call)
}

/// Retrieves a call by ID.
pub fn get_call(conn: &Connection, call_id: i64) -> Result<Call, StoreError> {
    conn.query_row(
        "SELECT id, name, created_at, updated_at FROM calls WHERE id = ?1",
        [call_id],
        map_row_to_call,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("call {call_id}")))
}

/// Lists all calls, newest first.
pub fn list_calls(conn: &Connection) -> Result<Vec<Call>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, updated_at
         FROM calls ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt.query_map([], map_row_to_call)?;
    let mut calls = Vec::new();
    for row in rows {
        calls.push(row?);
    }
    Ok(calls)
}

pub(crate) fn map_row_to_call(row: &Row) -> rusqlite::Result<Call> {
    Ok(Call {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}
