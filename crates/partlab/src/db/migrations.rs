//! Schema migrations, applied in order and recorded in `_migrations`.

use std::collections::HashSet;

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    kind: Kind,
}

enum Kind {
    /// Plain SQL batch.
    Standard,
    /// ALTER TABLE ADD COLUMN; skipped when the column is already there,
    /// so re-running against an existing file stays safe.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_jobs_table",
        sql: "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                source_ref TEXT NOT NULL,
                filename TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                poly_count INTEGER,
                volume_mm3 REAL,
                dim_x REAL,
                dim_y REAL,
                dim_z REAL,
                watertight INTEGER,
                error_detail TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);",
        kind: Kind::Standard,
    },
    Migration {
        version: 2,
        name: "create_tasks_table",
        sql: "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                leased_until INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_leased_until ON tasks(leased_until);",
        kind: Kind::Standard,
    },
    Migration {
        version: 3,
        name: "add_mime_type_to_jobs",
        sql: "ALTER TABLE jobs ADD COLUMN mime_type TEXT;",
        kind: Kind::AddColumn {
            table: "jobs",
            column: "mime_type",
        },
    },
];

/// Brings the schema up to date, applying each pending migration once.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: HashSet<u32> = conn
        .prepare("SELECT version FROM _migrations")?
        .query_map([], |r| r.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        log::info!(
            "Applying migration v{} ({})",
            migration.version,
            migration.name
        );

        let skip = match migration.kind {
            Kind::Standard => false,
            Kind::AddColumn { table, column } => column_exists(conn, table, column)?,
        };

        if !skip {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        }

        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )?;
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    // pragma_table_info is a table-valued function, so both names bind as
    // parameters and no identifier interpolation is needed.
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}
