//! Pipeline coordinator: owns the job lifecycle.
//!
//! `submit` persists a pending record and enqueues a task; `process` is
//! invoked by workers on task delivery and drives the
//! `pending → processing → {ready | error}` state machine. Analysis
//! failures are captured into the record; only infrastructure failures
//! (store/queue) escape `process`, leaving the task unacked so the queue
//! redelivers it.

pub mod record;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::analyzer::{AnalyzerRegistry, MeshMetrics};
use crate::db::{job_repo, now_rfc3339, Database, DatabaseError};
use crate::queue::{QueueError, TaskQueue};

pub use record::{JobRecord, JobStatus};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Bad submission, rejected synchronously. No job is created.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// What `process` did with a delivered task. All variants mean the task
/// should be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Analysis succeeded; metrics persisted.
    Ready,
    /// Analysis failed; diagnostic persisted.
    Failed,
    /// The job was not `pending` — duplicate delivery, nothing done.
    AlreadyHandled,
    /// No such job record; stale task.
    Missing,
}

pub struct Coordinator {
    db: Database,
    queue: Arc<dyn TaskQueue>,
    analyzer: Arc<AnalyzerRegistry>,
    analysis_timeout: Duration,
}

impl Coordinator {
    pub fn new(db: Database, queue: Arc<dyn TaskQueue>, analysis_timeout: Duration) -> Self {
        Self::with_analyzer(
            db,
            queue,
            Arc::new(AnalyzerRegistry::new()),
            analysis_timeout,
        )
    }

    /// Constructor with an injected analyzer registry.
    pub fn with_analyzer(
        db: Database,
        queue: Arc<dyn TaskQueue>,
        analyzer: Arc<AnalyzerRegistry>,
        analysis_timeout: Duration,
    ) -> Self {
        Self {
            db,
            queue,
            analyzer,
            analysis_timeout,
        }
    }

    /// Accepts a submission: persists a `pending` record and enqueues a
    /// task for it. Returns immediately; analysis happens off this path.
    pub fn submit(&self, source_ref: &Path) -> Result<String, CoordinatorError> {
        if source_ref.as_os_str().is_empty() {
            return Err(CoordinatorError::InvalidInput(
                "source_ref must not be empty".to_string(),
            ));
        }

        let record = JobRecord::new(source_ref);
        job_repo::insert(&self.db, &record)?;
        self.queue.enqueue(&record.id)?;

        info!(job_id = %record.id, filename = %record.filename, "Job submitted");
        Ok(record.id)
    }

    /// Returns the current record for a job.
    pub fn get_status(&self, job_id: &str) -> Result<JobRecord, CoordinatorError> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| CoordinatorError::NotFound(job_id.to_string()))
    }

    /// Processes one delivered task. Invoked by workers.
    ///
    /// Returns `Err` only for infrastructure failures, in which case the
    /// caller must leave the task unacknowledged.
    pub fn process(&self, job_id: &str) -> Result<ProcessOutcome, CoordinatorError> {
        let _span = info_span!("process_job", job_id = %job_id).entered();

        let Some(record) = job_repo::find_by_id(&self.db, job_id)? else {
            debug!("No record for delivered task; acknowledging");
            return Ok(ProcessOutcome::Missing);
        };

        // Idempotency guard: only the winner of this compare-and-set runs
        // analysis. Losers see a non-pending status and back off.
        if !job_repo::claim_processing(&self.db, job_id, &now_rfc3339())? {
            debug!(status = %record.status, "Job already claimed or finalized; acknowledging");
            return Ok(ProcessOutcome::AlreadyHandled);
        }

        match self.run_analysis(&record.source_ref) {
            Ok(metrics) => {
                if !job_repo::finalize_ready(&self.db, job_id, &metrics, &now_rfc3339())? {
                    warn!("Job left processing state before finalization");
                }
                info!(
                    poly_count = metrics.poly_count,
                    volume_mm3 = metrics.volume_mm3,
                    watertight = metrics.watertight,
                    "Analysis complete"
                );
                Ok(ProcessOutcome::Ready)
            }
            Err(detail) => {
                if !job_repo::finalize_error(&self.db, job_id, &detail, &now_rfc3339())? {
                    warn!("Job left processing state before finalization");
                }
                info!(error = %detail, "Analysis failed");
                Ok(ProcessOutcome::Failed)
            }
        }
    }

    /// Runs the analyzer on its own thread under a bounded time budget.
    ///
    /// Returns the diagnostic string to persist on failure. A timed-out
    /// analysis thread is left to finish in the background; its late
    /// result is discarded because the job is already finalized and the
    /// repository's conditional updates refuse further writes.
    fn run_analysis(&self, source_ref: &str) -> Result<MeshMetrics, String> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let analyzer = Arc::clone(&self.analyzer);
        let path = PathBuf::from(source_ref);

        std::thread::spawn(move || {
            let _ = sender.send(analyzer.analyze(&path));
        });

        match receiver.recv_timeout(self.analysis_timeout) {
            Ok(Ok(metrics)) => Ok(metrics),
            Ok(Err(e)) => Err(e.to_string()),
            Err(RecvTimeoutError::Timeout) => Err(format!(
                "analysis timed out after {}s",
                self.analysis_timeout.as_secs_f64()
            )),
            // The analyzer thread panicked and dropped its sender.
            Err(RecvTimeoutError::Disconnected) => {
                Err("analysis aborted unexpectedly".to_string())
            }
        }
    }
}
