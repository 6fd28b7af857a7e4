//! Persistence layer: a shared rusqlite handle plus repository modules.
//!
//! One SQLite file holds both the job records and the task queue, so a
//! finalized status and its acknowledged task live in the same durable
//! store. Access goes through a `Mutex<Connection>`; SQLite serializes
//! writers anyway, and WAL mode keeps readers cheap.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

/// Shared database handle. Clones are cheap and refer to the same
/// underlying connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating it and its parent directories as
    /// needed, and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self::from_connection(conn))
    }

    /// Fresh in-memory database with the full schema, for tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;

        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with the connection lock held.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Canonical database location: `~/.partlab/data/partlab.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".partlab").join("data").join("partlab.db"))
}

/// Current UTC time as a fixed-width RFC3339 string.
///
/// Fixed fractional width keeps lexicographic ordering consistent with
/// chronological ordering, which job listing and `updated_at` checks rely on.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied_migrations(db: &Database) -> u32 {
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            Ok(count)
        })
        .unwrap()
    }

    #[test]
    fn test_open_in_memory_applies_schema() {
        let db = Database::open_in_memory().unwrap();
        assert!(applied_migrations(&db) > 0);
    }

    #[test]
    fn test_open_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(&path).unwrap();
        assert!(applied_migrations(&db) > 0);
        assert!(path.exists());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("partlab.db"));
        assert!(path.to_string_lossy().contains(".partlab"));
    }

    #[test]
    fn test_now_rfc3339_is_monotonic_and_fixed_width() {
        let a = now_rfc3339();
        let b = now_rfc3339();
        assert!(a <= b);
        // 2026-08-26T12:34:56.123456Z
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_clones_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs (id, source_ref, filename, created_at, updated_at) \
                 VALUES ('t1', '/tmp/part.stl', 'part.stl', '2026-01-01', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        db2.with_conn(|conn| {
            let count: u32 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
            assert_eq!(count, 1);
            Ok(())
        })
        .unwrap();
    }
}
