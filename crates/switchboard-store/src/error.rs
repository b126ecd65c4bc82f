//! Error taxonomy shared by every store operation.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// The first three variants are the full vocabulary mutations use to reject
/// a request; callers map them onto their own surface (the HTTP layer turns
/// them into 404, 409, and 400). `Database` carries everything SQLite can
/// fail with and always means the operation rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write collides with state that already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request is well-formed but its content is unusable.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
