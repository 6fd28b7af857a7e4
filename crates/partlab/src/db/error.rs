//! Errors for the persistence layer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot prepare database path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A thread panicked while holding the connection lock.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
