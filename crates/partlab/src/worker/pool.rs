use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::coordinator::{Coordinator, ProcessOutcome};
use crate::queue::TaskQueue;

/// Idle poll interval when the queue is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Backoff after a queue or store failure.
const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Emitted by a worker after each fully handled (acknowledged) task.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub job_id: String,
    pub task_id: i64,
    pub attempt: u32,
    pub outcome: ProcessOutcome,
}

pub struct WorkerPool {
    result_receiver: Receiver<ProcessReport>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads that pull tasks from the queue and
    /// hand them to the coordinator.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn start(
        coordinator: Arc<Coordinator>,
        queue: Arc<dyn TaskQueue>,
        worker_count: usize,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (result_sender, result_receiver) = unbounded::<ProcessReport>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let coordinator = Arc::clone(&coordinator);
            let queue = Arc::clone(&queue);
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);

            let handle = thread::spawn(move || {
                run_worker(worker_id, coordinator, queue, result_tx, shutdown_flag);
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            result_receiver,
            workers,
            shutdown,
        }
    }

    pub fn try_recv_report(&self) -> Option<ProcessReport> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_report(&self) -> Option<ProcessReport> {
        self.result_receiver.recv().ok()
    }

    pub fn recv_report_timeout(&self, timeout: Duration) -> Option<ProcessReport> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    coordinator: Arc<Coordinator>,
    queue: Arc<dyn TaskQueue>,
    result_sender: Sender<ProcessReport>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        let delivery = match queue.deliver() {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(e) => {
                error!("Worker {} failed to poll queue: {}", worker_id, e);
                thread::sleep(ERROR_BACKOFF);
                continue;
            }
        };

        debug!(
            "Worker {} processing job {} (attempt {})",
            worker_id, delivery.job_id, delivery.attempt
        );

        match coordinator.process(&delivery.job_id) {
            Ok(outcome) => {
                if let Err(e) = queue.ack(&delivery) {
                    // The lease will expire and the task will come back;
                    // the coordinator's claim makes the retry a no-op.
                    warn!(
                        "Worker {} failed to ack task {}: {}",
                        worker_id, delivery.task_id, e
                    );
                }

                let report = ProcessReport {
                    job_id: delivery.job_id,
                    task_id: delivery.task_id,
                    attempt: delivery.attempt,
                    outcome,
                };
                if result_sender.send(report).is_err() {
                    debug!("Worker {} report channel disconnected", worker_id);
                    break;
                }
            }
            Err(e) => {
                // Left unacked on purpose: the task is redelivered once
                // its lease expires.
                error!(
                    "Worker {} infrastructure failure on job {}: {}",
                    worker_id, delivery.job_id, e
                );
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
