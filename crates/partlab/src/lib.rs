pub mod ai;
pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod logging;
pub mod queue;
pub mod storage;
pub mod worker;

pub use ai::{DescriberError, PartDescriber, PartDescription};
pub use analyzer::{AnalysisError, AnalyzerRegistry, MeshMetrics};
pub use config::{load_config, AiConfig, Config};
pub use coordinator::{Coordinator, CoordinatorError, JobRecord, JobStatus, ProcessOutcome};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, PartlabError, Result, StorageError};
pub use queue::{Delivery, QueueError, SqliteTaskQueue, TaskQueue};
pub use storage::ModelStore;
pub use worker::{ProcessReport, WorkerPool};
