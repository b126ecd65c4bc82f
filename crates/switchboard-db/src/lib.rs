//! Database layer for the Switchboard platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table in Switchboard is created through
//! versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-process store is all the platform
//!   needs. WAL allows concurrent readers with a single writer, which matches
//!   the read-heavy access pattern of the call/tag/task graph.
//! - **Foreign keys always on**: the three association tables rely on
//!   `ON DELETE CASCADE` to drop link rows when a parent entity is destroyed,
//!   so every pooled connection enables `PRAGMA foreign_keys` at checkout.
//! - **Embedded migrations**: the schema ships inside the binary as
//!   `include_str!` SQL, so deployed servers can never run against a schema
//!   the code was not built for.

mod migrations;
mod pool;

pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool, DbRuntimeSettings};
