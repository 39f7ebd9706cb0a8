//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A step configuration could not be (de)serialized.
    #[error("Step configuration error: {0}")]
    StepConfig(#[from] serde_json::Error),

    /// A stored timestamp could not be parsed.
    #[error("Invalid timestamp '{value}' in column '{column}'")]
    InvalidTimestamp { column: &'static str, value: String },

    /// The curation holds a step the store has no representation for.
    #[error("Step {position} of curation '{short_name}' cannot be persisted")]
    NotPersistable { short_name: String, position: usize },

    /// Another curation already uses this short name.
    #[error("A curation named '{0}' already exists")]
    DuplicateShortName(String),
}
