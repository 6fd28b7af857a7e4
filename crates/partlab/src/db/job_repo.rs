//! Job repository — persistence for the `jobs` table.
//!
//! Every status transition is a single conditional UPDATE (compare-and-set
//! on `status`), so duplicate deliveries and racing workers resolve to
//! exactly one winner without long-held locks.

use rusqlite::{params, Row};

use crate::analyzer::MeshMetrics;
use crate::coordinator::record::{JobRecord, JobStatus};

use super::{Database, DatabaseError};

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn from_row(row: &Row<'_>) -> Result<JobRecord, rusqlite::Error> {
    let status_raw: String = row.get("status")?;
    let status = JobStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown job status '{}'", status_raw).into(),
        )
    })?;

    let poly_count: Option<i64> = row.get("poly_count")?;
    let metrics = match (status, poly_count) {
        (JobStatus::Ready, Some(poly_count)) => Some(MeshMetrics {
            poly_count: poly_count.max(0) as u64,
            volume_mm3: row.get("volume_mm3")?,
            dim_x: row.get("dim_x")?,
            dim_y: row.get("dim_y")?,
            dim_z: row.get("dim_z")?,
            watertight: row.get::<_, i64>("watertight")? != 0,
        }),
        _ => None,
    };

    Ok(JobRecord {
        id: row.get("id")?,
        source_ref: row.get("source_ref")?,
        filename: row.get("filename")?,
        mime_type: row.get("mime_type")?,
        status,
        metrics,
        error_detail: row.get("error_detail")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    })
}

/// Inserts a new job row. Metric columns stay NULL until finalization.
pub fn insert(db: &Database, job: &JobRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, source_ref, filename, mime_type, status, error_detail,
             created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.source_ref,
                job.filename,
                job.mime_type,
                job.status.as_str(),
                job.error_detail,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Claims a pending job for processing.
///
/// Returns true if this caller won the `pending → processing` transition;
/// false if the job was already claimed or finalized (duplicate delivery).
pub fn claim_processing(db: &Database, id: &str, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE jobs SET status = 'processing', updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, updated_at],
        )?;
        Ok(rows == 1)
    })
}

/// Finalizes a processing job as `ready`, persisting metrics atomically
/// with the status change. Returns false if the job was not `processing`.
pub fn finalize_ready(
    db: &Database,
    id: &str,
    metrics: &MeshMetrics,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE jobs SET status = 'ready', poly_count = ?2, volume_mm3 = ?3,
             dim_x = ?4, dim_y = ?5, dim_z = ?6, watertight = ?7,
             updated_at = ?8, completed_at = ?8
             WHERE id = ?1 AND status = 'processing'",
            params![
                id,
                metrics.poly_count as i64,
                metrics.volume_mm3,
                metrics.dim_x,
                metrics.dim_y,
                metrics.dim_z,
                metrics.watertight as i64,
                updated_at,
            ],
        )?;
        Ok(rows == 1)
    })
}

/// Finalizes a processing job as `error` with a diagnostic summary.
/// Returns false if the job was not `processing`.
pub fn finalize_error(
    db: &Database,
    id: &str,
    error_detail: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE jobs SET status = 'error', error_detail = ?2,
             updated_at = ?3, completed_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error_detail, updated_at],
        )?;
        Ok(rows == 1)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRecord>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let (where_clause, status_param) = match filter.status {
            Some(status) => ("WHERE status = ?1", Some(status.as_str())),
            None => ("", None),
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let total: u64 = match status_param {
            Some(status) => conn.query_row(&count_sql, params![status], |r| r.get(0))?,
            None => conn.query_row(&count_sql, [], |r| r.get(0))?,
        };

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );

        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRecord> = match status_param {
            Some(status) => stmt
                .query_map(params![status], from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok((rows, total))
    })
}
