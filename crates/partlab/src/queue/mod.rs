//! Durable task queue carrying job identifiers to the worker pool.
//!
//! Delivery is at-least-once: a task may be delivered again (to the same
//! or another worker) until it is acknowledged, and acknowledgment happens
//! only after the job's terminal status is durably persisted. There is no
//! ordering guarantee between different jobs.

pub mod sqlite;

use thiserror::Error;

pub use sqlite::SqliteTaskQueue;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Storage(#[from] crate::db::DatabaseError),
}

/// One delivered task. Holds the broker-side task id needed for `ack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub task_id: i64,
    pub job_id: String,
    /// 1 on first delivery, incremented on each redelivery.
    pub attempt: u32,
}

pub trait TaskQueue: Send + Sync {
    /// Enqueues a task for the given job. Returns once the task is
    /// durably accepted.
    fn enqueue(&self, job_id: &str) -> Result<(), QueueError>;

    /// Claims the next available task, if any, under a time-bounded lease.
    fn deliver(&self) -> Result<Option<Delivery>, QueueError>;

    /// Acknowledges a delivered task. Must be called only after the
    /// job's terminal status has been durably persisted.
    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Number of tasks not yet acknowledged (leased or waiting).
    fn depth(&self) -> Result<u64, QueueError>;
}
