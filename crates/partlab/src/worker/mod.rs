pub mod pool;

pub use pool::{ProcessReport, WorkerPool};
