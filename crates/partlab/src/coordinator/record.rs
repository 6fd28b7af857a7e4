//! Job record: the persisted state of one analysis request.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::MeshMetrics;
use crate::db::now_rfc3339;

/// Lifecycle status of a job. Transitions are forward-only:
/// `pending → processing → {ready | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Ready => "ready",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "ready" => Some(JobStatus::Ready),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions for a given task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted state of one analysis request.
///
/// `metrics` is present iff `status == ready`; `error_detail` iff
/// `status == error`. Both are enforced by conditional updates in the
/// job repository, never by callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    /// Stable identifier (UUID), immutable, assigned at creation.
    pub id: String,
    /// Path to the input bytes; immutable once set.
    pub source_ref: String,
    /// Original filename, for display.
    pub filename: String,
    /// MIME type guessed from the filename, if known.
    pub mime_type: Option<String>,
    pub status: JobStatus,
    pub metrics: Option<MeshMetrics>,
    pub error_detail: Option<String>,
    pub created_at: String,
    /// Refreshed on every status transition; never decreases.
    pub updated_at: String,
    /// Set when a terminal status is reached.
    pub completed_at: Option<String>,
}

impl JobRecord {
    /// Creates a fresh `pending` record for the given source file.
    pub fn new(source_ref: &Path) -> Self {
        let filename = source_ref
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let mime_type = mime_guess::from_path(source_ref)
            .first()
            .map(|m| m.to_string());
        let now = now_rfc3339();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_ref: source_ref.to_string_lossy().to_string(),
            filename,
            mime_type,
            status: JobStatus::Pending,
            metrics: None,
            error_detail: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }
}
