//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially
//! on startup, tracked by the `_switchboard_migrations` table. Each migration
//! runs exactly once — if it has already been applied, it is skipped.

use rusqlite::Connection;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_calls",
        sql: include_str!("migrations/000_calls.sql"),
    },
    Migration {
        name: "001_tags",
        sql: include_str!("migrations/001_tags.sql"),
    },
    Migration {
        name: "002_tasks",
        sql: include_str!("migrations/002_tasks.sql"),
    },
    Migration {
        name: "003_call_tags",
        sql: include_str!("migrations/003_call_tags.sql"),
    },
    Migration {
        name: "004_call_tasks",
        sql: include_str!("migrations/004_call_tasks.sql"),
    },
    Migration {
        name: "005_tag_tasks",
        sql: include_str!("migrations/005_tag_tasks.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations against the given connection.
///
/// Migrations that have already been applied (tracked in
/// `_switchboard_migrations`) are skipped. New migrations are applied in
/// order and recorded.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// migration tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    // The tracking table must exist before we can check what's been applied.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _switchboard_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_switchboard_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _switchboard_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(
                migration = migration.name,
                "migration already applied, skipping"
            );
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        tx.execute_batch(migration.sql)
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        tx.execute(
            "INSERT INTO _switchboard_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(|e| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source: e,
        })?;

        tx.commit().map_err(|e| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source: e,
        })?;

        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        // The pool initializer enables this in production; raw test
        // connections must do it themselves for cascade tests to mean
        // anything.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("should enable foreign keys");
        conn
    }

    #[test]
    fn run_migrations_on_fresh_db() {
        let conn = fresh_conn();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 6, "should apply every migration");

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM _switchboard_migrations", [], |row| {
                row.get(0)
            })
            .expect("should query migration count");
        assert_eq!(count, 6);
    }

    #[test]
    fn run_migrations_idempotent() {
        let conn = fresh_conn();

        let first = run_migrations(&conn).expect("first run should succeed");
        assert_eq!(first, 6);

        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0, "no new migrations to apply");
    }

    #[test]
    fn all_tables_exist_after_migrating() {
        let conn = fresh_conn();
        run_migrations(&conn).expect("migrations should succeed");

        for table in ["calls", "tags", "tasks", "call_tags", "call_tasks", "tag_tasks"] {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                    [table],
                    |row| row.get(0),
                )
                .expect("should query sqlite_master");
            assert!(exists, "{table} table should exist");
        }
    }

    #[test]
    fn task_status_check_constraint_rejects_unknown_values() {
        let conn = fresh_conn();
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute("INSERT INTO calls (name) VALUES ('support review')", [])
            .expect("should insert call");
        conn.execute("INSERT INTO tasks (name) VALUES ('follow up')", [])
            .expect("should insert task");

        let err = conn.execute(
            "INSERT INTO call_tasks (call_id, task_id, task_status) VALUES (1, 1, 'Done')",
            [],
        );
        assert!(err.is_err(), "unknown status should violate the CHECK");

        conn.execute(
            "INSERT INTO call_tasks (call_id, task_id, task_status) VALUES (1, 1, 'In Progress')",
            [],
        )
        .expect("known status should insert");
    }

    #[test]
    fn deleting_a_parent_cascades_to_link_rows() {
        let conn = fresh_conn();
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute_batch(
            "INSERT INTO calls (name) VALUES ('onboarding call');
             INSERT INTO tags (name) VALUES ('Billing');
             INSERT INTO tasks (name, is_suggested) VALUES ('Verify Invoice', 1);
             INSERT INTO call_tags (call_id, tag_id) VALUES (1, 1);
             INSERT INTO tag_tasks (tag_id, task_id) VALUES (1, 1);",
        )
        .expect("should seed linked rows");

        conn.execute("DELETE FROM tags WHERE id = 1", [])
            .expect("should delete tag");

        let call_tag_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM call_tags", [], |row| row.get(0))
            .expect("should count call_tags");
        let tag_task_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tag_tasks", [], |row| row.get(0))
            .expect("should count tag_tasks");
        assert_eq!(call_tag_count, 0, "call_tags rows should cascade away");
        assert_eq!(tag_task_count, 0, "tag_tasks rows should cascade away");
    }

    #[test]
    fn migration_side_effects_rollback_when_tracking_insert_fails() {
        let conn = fresh_conn();
        let migrations = [Migration {
            name: "001_tracking_insert_conflict",
            sql: "
                CREATE TABLE rollback_probe (id INTEGER PRIMARY KEY);
                INSERT INTO _switchboard_migrations (name) VALUES ('001_tracking_insert_conflict');
            ",
        }];

        let err = run_migrations_from_list(&conn, &migrations)
            .expect_err("tracking insert conflict should fail migration");

        match err {
            MigrationError::ExecutionFailed { name, .. } => {
                assert_eq!(name, "001_tracking_insert_conflict")
            }
            other => panic!("unexpected error type: {other:?}"),
        }

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'rollback_probe')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");

        assert!(
            !exists,
            "schema side effects should be rolled back when tracking insert fails"
        );
    }
}
