//! SQLite-backed task queue.
//!
//! Tasks live in the `tasks` table. `deliver` claims the oldest task whose
//! lease is absent or expired by setting a new lease in a conditional
//! UPDATE; `ack` deletes the row. A worker that dies mid-processing simply
//! lets its lease expire, after which the task is delivered again.

use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use rusqlite::params;

use crate::db::Database;

use super::{Delivery, QueueError, TaskQueue};

pub struct SqliteTaskQueue {
    db: Database,
    lease: Duration,
}

impl SqliteTaskQueue {
    pub fn new(db: Database, lease: Duration) -> Self {
        Self { db, lease }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl TaskQueue for SqliteTaskQueue {
    fn enqueue(&self, job_id: &str) -> Result<(), QueueError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (job_id, enqueued_at, attempts, leased_until)
                 VALUES (?1, ?2, 0, NULL)",
                params![job_id, now_millis()],
            )?;
            Ok(())
        })?;
        debug!("Enqueued task for job {}", job_id);
        Ok(())
    }

    fn deliver(&self) -> Result<Option<Delivery>, QueueError> {
        let now = now_millis();
        let lease_until = now + self.lease.as_millis() as i64;

        let claimed = self.db.with_conn(|conn| {
            let candidate: Option<(i64, String, u32)> = conn
                .query_row(
                    "SELECT id, job_id, attempts FROM tasks
                     WHERE leased_until IS NULL OR leased_until <= ?1
                     ORDER BY id LIMIT 1",
                    params![now],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(crate::db::DatabaseError::Sqlite(other)),
                })?;

            let Some((task_id, job_id, attempts)) = candidate else {
                return Ok(None);
            };

            // The claim itself is conditional so a concurrent claimant
            // (another process against the same file) cannot double-win.
            let rows = conn.execute(
                "UPDATE tasks SET leased_until = ?2, attempts = attempts + 1
                 WHERE id = ?1 AND (leased_until IS NULL OR leased_until <= ?3)",
                params![task_id, lease_until, now],
            )?;
            if rows == 0 {
                return Ok(None);
            }

            Ok(Some(Delivery {
                task_id,
                job_id,
                attempt: attempts + 1,
            }))
        })?;

        if let Some(ref delivery) = claimed {
            if delivery.attempt > 1 {
                warn!(
                    "Redelivering task {} for job {} (attempt {})",
                    delivery.task_id, delivery.job_id, delivery.attempt
                );
            } else {
                debug!(
                    "Delivered task {} for job {}",
                    delivery.task_id, delivery.job_id
                );
            }
        }

        Ok(claimed)
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![delivery.task_id])?;
            Ok(())
        })?;
        debug!(
            "Acknowledged task {} for job {}",
            delivery.task_id, delivery.job_id
        );
        Ok(())
    }

    fn depth(&self) -> Result<u64, QueueError> {
        let count = self.db.with_conn(|conn| {
            let count: u64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |r| r.get(0))?;
            Ok(count)
        })?;
        Ok(count)
    }
}
