//! Shared test utilities for partlab integration tests.
//!
//! Provides `TestEnv` for isolated pipeline runs (temp upload directory,
//! in-memory database shared by queue and coordinator) and builders for
//! model-file fixtures in the supported formats.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use partlab::{Coordinator, Database, ModelStore, SqliteTaskQueue};

/// Quad faces of an axis-aligned cube with one corner at the origin,
/// wound counter-clockwise seen from outside.
fn cube_quads(edge: f64) -> [[[f64; 3]; 4]; 6] {
    let s = edge;
    [
        // bottom (z = 0), top (z = s)
        [[0., 0., 0.], [0., s, 0.], [s, s, 0.], [s, 0., 0.]],
        [[0., 0., s], [s, 0., s], [s, s, s], [0., s, s]],
        // front (y = 0), back (y = s)
        [[0., 0., 0.], [s, 0., 0.], [s, 0., s], [0., 0., s]],
        [[0., s, 0.], [0., s, s], [s, s, s], [s, s, 0.]],
        // left (x = 0), right (x = s)
        [[0., 0., 0.], [0., 0., s], [0., s, s], [0., s, 0.]],
        [[s, 0., 0.], [s, s, 0.], [s, s, s], [s, 0., s]],
    ]
}

fn quads_to_triangles(quads: &[[[f64; 3]; 4]]) -> Vec<[[f64; 3]; 3]> {
    let mut triangles = Vec::with_capacity(quads.len() * 2);
    for quad in quads {
        triangles.push([quad[0], quad[1], quad[2]]);
        triangles.push([quad[0], quad[2], quad[3]]);
    }
    triangles
}

fn ascii_stl(name: &str, triangles: &[[[f64; 3]; 3]]) -> String {
    let mut out = format!("solid {}\n", name);
    for tri in triangles {
        out.push_str("  facet normal 0 0 0\n    outer loop\n");
        for v in tri {
            out.push_str(&format!("      vertex {} {} {}\n", v[0], v[1], v[2]));
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    out.push_str(&format!("endsolid {}\n", name));
    out
}

fn binary_stl(triangles: &[[[f64; 3]; 3]]) -> Vec<u8> {
    let mut out = vec![0u8; 80];
    out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for tri in triangles {
        // normal, unused by the parser
        for _ in 0..3 {
            out.extend_from_slice(&0f32.to_le_bytes());
        }
        for v in tri {
            for coord in v {
                out.extend_from_slice(&(*coord as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}

/// Closed cube as ASCII STL, volume `edge^3`, 12 triangles.
pub fn ascii_cube_stl(edge: f64) -> String {
    ascii_stl("cube", &quads_to_triangles(&cube_quads(edge)))
}

/// Closed cube as binary STL.
pub fn binary_cube_stl(edge: f64) -> Vec<u8> {
    binary_stl(&quads_to_triangles(&cube_quads(edge)))
}

/// Cube with the top face removed: same extents, but not watertight.
pub fn open_box_stl(edge: f64) -> String {
    let quads = cube_quads(edge);
    let open: Vec<_> = quads
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, q)| *q)
        .collect();
    ascii_stl("openbox", &quads_to_triangles(&open))
}

/// Closed cube as Wavefront OBJ, same winding as the STL fixtures.
pub fn obj_cube(edge: f64) -> String {
    let s = edge;
    let vertices = [
        [0., 0., 0.],
        [s, 0., 0.],
        [s, s, 0.],
        [0., s, 0.],
        [0., 0., s],
        [s, 0., s],
        [s, s, s],
        [0., s, s],
    ];
    let faces = [
        [1, 4, 3, 2],
        [5, 6, 7, 8],
        [1, 2, 6, 5],
        [4, 8, 7, 3],
        [1, 5, 8, 4],
        [2, 3, 7, 6],
    ];
    let mut out = String::from("# cube\n");
    for v in vertices {
        out.push_str(&format!("v {} {} {}\n", v[0], v[1], v[2]));
    }
    for f in faces {
        out.push_str(&format!("f {} {} {} {}\n", f[0], f[1], f[2], f[3]));
    }
    out
}

/// Isolated pipeline environment: in-memory database shared by queue and
/// coordinator, plus a temp upload directory.
pub struct TestEnv {
    temp_dir: TempDir,
    pub db: Database,
    pub queue: Arc<SqliteTaskQueue>,
    pub coordinator: Arc<Coordinator>,
    pub store: ModelStore,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_durations(Duration::from_secs(30), Duration::from_secs(10))
    }

    pub fn with_durations(lease: Duration, analysis_timeout: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        let queue = Arc::new(SqliteTaskQueue::new(db.clone(), lease));
        let coordinator = Arc::new(Coordinator::new(db.clone(), queue.clone(), analysis_timeout));
        let store = ModelStore::new(temp_dir.path().join("uploads"));

        Self {
            temp_dir,
            db,
            queue,
            coordinator,
            store,
        }
    }

    /// Stores fixture content through the model store and submits it,
    /// returning the new job id.
    pub fn submit_model(&self, filename: &str, content: &[u8]) -> String {
        let job_id_hint = uuid_like();
        let path = self
            .store
            .save(&job_id_hint, filename, content)
            .expect("Failed to store fixture");
        self.coordinator
            .submit(&path)
            .expect("Failed to submit job")
    }

    pub fn base_dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}

fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("job-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}
