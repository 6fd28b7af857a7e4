//! End-to-end tests for the partlab analysis pipeline.
//!
//! Each test submits a model file, runs it through the worker pool (or the
//! coordinator directly) and asserts on the resulting job record.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ascii_cube_stl, binary_cube_stl, obj_cube, open_box_stl, TestEnv};
use partlab::queue::TaskQueue;
use partlab::{JobStatus, ProcessOutcome, WorkerPool};

const REPORT_DEADLINE: Duration = Duration::from_secs(10);

#[test]
fn submit_returns_pending_before_any_processing() {
    let env = TestEnv::new();
    let job_id = env.submit_model("cube.stl", ascii_cube_stl(10.0).as_bytes());

    let record = env.coordinator.get_status(&job_id).unwrap();
    assert_eq!(record.status, JobStatus::Pending);
    assert!(record.metrics.is_none());
    assert!(record.error_detail.is_none());
    assert!(record.completed_at.is_none());
    assert_eq!(record.filename, "cube.stl");
    assert_eq!(env.queue.depth().unwrap(), 1);
}

#[test]
fn cube_stl_through_worker_pool() {
    let env = TestEnv::new();
    let job_id = env.submit_model("cube.stl", ascii_cube_stl(10.0).as_bytes());

    let pool = WorkerPool::start(env.coordinator.clone(), env.queue.clone(), 2);
    let report = pool
        .recv_report_timeout(REPORT_DEADLINE)
        .expect("no report before deadline");
    pool.shutdown();
    pool.wait();

    assert_eq!(report.job_id, job_id);
    assert_eq!(report.outcome, ProcessOutcome::Ready);

    let record = env.coordinator.get_status(&job_id).unwrap();
    assert_eq!(record.status, JobStatus::Ready);
    assert!(record.completed_at.is_some());

    let metrics = record.metrics.expect("ready job must carry metrics");
    assert_eq!(metrics.poly_count, 12);
    assert!((metrics.volume_mm3 - 1000.0).abs() < 1e-6);
    assert!((metrics.dim_x - 10.0).abs() < 1e-9);
    assert!((metrics.dim_y - 10.0).abs() < 1e-9);
    assert!((metrics.dim_z - 10.0).abs() < 1e-9);
    assert!(metrics.watertight);

    // Task was acknowledged after finalization.
    assert_eq!(env.queue.depth().unwrap(), 0);
}

#[test]
fn binary_stl_matches_ascii_metrics() {
    let env = TestEnv::new();
    let ascii_id = env.submit_model("cube_a.stl", ascii_cube_stl(7.0).as_bytes());
    let binary_id = env.submit_model("cube_b.stl", &binary_cube_stl(7.0));

    assert_eq!(
        env.coordinator.process(&ascii_id).unwrap(),
        ProcessOutcome::Ready
    );
    assert_eq!(
        env.coordinator.process(&binary_id).unwrap(),
        ProcessOutcome::Ready
    );

    let a = env.coordinator.get_status(&ascii_id).unwrap().metrics.unwrap();
    let b = env
        .coordinator
        .get_status(&binary_id)
        .unwrap()
        .metrics
        .unwrap();

    assert_eq!(a.poly_count, b.poly_count);
    // Binary STL stores f32 coordinates, so allow single-precision slack.
    assert!((a.volume_mm3 - b.volume_mm3).abs() < 1e-3);
    assert!((a.dim_x - b.dim_x).abs() < 1e-4);
    assert_eq!(a.watertight, b.watertight);
}

#[test]
fn obj_cube_produces_same_metrics_as_stl() {
    let env = TestEnv::new();
    let job_id = env.submit_model("cube.obj", obj_cube(10.0).as_bytes());

    assert_eq!(
        env.coordinator.process(&job_id).unwrap(),
        ProcessOutcome::Ready
    );

    let metrics = env.coordinator.get_status(&job_id).unwrap().metrics.unwrap();
    assert_eq!(metrics.poly_count, 12);
    assert!((metrics.volume_mm3 - 1000.0).abs() < 1e-6);
    assert!(metrics.watertight);
}

#[test]
fn unsupported_format_finalizes_as_error() {
    let env = TestEnv::new();
    let job_id = env.submit_model("drawing.dwg", b"not a mesh at all");

    let pool = WorkerPool::start(env.coordinator.clone(), env.queue.clone(), 1);
    let report = pool
        .recv_report_timeout(REPORT_DEADLINE)
        .expect("no report before deadline");
    pool.shutdown();
    pool.wait();

    assert_eq!(report.outcome, ProcessOutcome::Failed);

    let record = env.coordinator.get_status(&job_id).unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert!(record.completed_at.is_some());
    assert!(record.metrics.is_none());
    let detail = record.error_detail.expect("error job must carry a detail");
    assert!(detail.contains("unsupported model format"), "{}", detail);
}

#[test]
fn open_mesh_is_ready_with_zero_volume() {
    let env = TestEnv::new();
    let job_id = env.submit_model("shell.stl", open_box_stl(10.0).as_bytes());

    assert_eq!(
        env.coordinator.process(&job_id).unwrap(),
        ProcessOutcome::Ready
    );

    let record = env.coordinator.get_status(&job_id).unwrap();
    assert_eq!(record.status, JobStatus::Ready);

    let metrics = record.metrics.unwrap();
    assert_eq!(metrics.poly_count, 10);
    assert!(!metrics.watertight);
    assert_eq!(metrics.volume_mm3, 0.0);
    // Extents still come from all vertices, including the open rim.
    assert!((metrics.dim_z - 10.0).abs() < 1e-9);
}

#[test]
fn duplicate_task_for_finished_job_is_acknowledged_without_rework() {
    let env = TestEnv::new();
    let job_id = env.submit_model("cube.stl", ascii_cube_stl(10.0).as_bytes());

    // A second task for the same job, as a redelivery would produce.
    env.queue.enqueue(&job_id).unwrap();
    assert_eq!(env.queue.depth().unwrap(), 2);

    let pool = WorkerPool::start(env.coordinator.clone(), env.queue.clone(), 1);
    let first = pool.recv_report_timeout(REPORT_DEADLINE).unwrap();
    let second = pool.recv_report_timeout(REPORT_DEADLINE).unwrap();
    pool.shutdown();
    pool.wait();

    assert_eq!(first.outcome, ProcessOutcome::Ready);
    assert_eq!(second.outcome, ProcessOutcome::AlreadyHandled);
    assert_eq!(env.queue.depth().unwrap(), 0);

    let record = env.coordinator.get_status(&job_id).unwrap();
    assert_eq!(record.status, JobStatus::Ready);
}

#[test]
fn worker_pool_drains_a_batch_of_mixed_jobs() {
    let env = TestEnv::new();

    let good: Vec<String> = (0..3)
        .map(|i| env.submit_model(&format!("cube_{}.stl", i), ascii_cube_stl(5.0).as_bytes()))
        .collect();
    let bad = env.submit_model("junk.bin", b"\x00\x01\x02");

    let pool = WorkerPool::start(env.coordinator.clone(), env.queue.clone(), 3);
    for _ in 0..4 {
        pool.recv_report_timeout(REPORT_DEADLINE)
            .expect("no report before deadline");
    }
    pool.shutdown();
    pool.wait();

    for job_id in &good {
        let record = env.coordinator.get_status(job_id).unwrap();
        assert_eq!(record.status, JobStatus::Ready);
        let metrics = record.metrics.unwrap();
        assert!((metrics.volume_mm3 - 125.0).abs() < 1e-6);
    }
    let record = env.coordinator.get_status(&bad).unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(env.queue.depth().unwrap(), 0);
}

#[test]
fn unacked_task_is_redelivered_after_lease_expiry() {
    let env = TestEnv::with_durations(Duration::from_millis(30), Duration::from_secs(10));
    let job_id = env.submit_model("cube.stl", ascii_cube_stl(10.0).as_bytes());

    // First delivery is never acknowledged (simulated worker death).
    let first = env.queue.deliver().unwrap().unwrap();
    assert_eq!(first.job_id, job_id);
    std::thread::sleep(Duration::from_millis(60));

    let second = env.queue.deliver().unwrap().unwrap();
    assert_eq!(second.job_id, job_id);
    assert_eq!(second.attempt, 2);

    // The surviving delivery completes the job as usual.
    assert_eq!(
        env.coordinator.process(&second.job_id).unwrap(),
        ProcessOutcome::Ready
    );
    env.queue.ack(&second).unwrap();
    assert_eq!(env.queue.depth().unwrap(), 0);
}

#[test]
fn timestamps_follow_the_lifecycle() {
    let env = TestEnv::new();
    let job_id = env.submit_model("cube.stl", ascii_cube_stl(10.0).as_bytes());

    let pending = env.coordinator.get_status(&job_id).unwrap();
    assert_eq!(pending.created_at, pending.updated_at);

    env.coordinator.process(&job_id).unwrap();

    let ready = env.coordinator.get_status(&job_id).unwrap();
    assert!(ready.updated_at >= pending.updated_at);
    assert_eq!(ready.completed_at.as_deref(), Some(ready.updated_at.as_str()));
    assert_eq!(ready.created_at, pending.created_at);
}
