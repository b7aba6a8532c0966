//! Job ledger. One row per dispatched job; ids are deterministic
//! (`{kind}:{natural_key}`) so a duplicate dispatch lands on the same row.
//! `succeeded` and `dead_lettered` are terminal and never regress.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_str, TS_FORMAT};
use crate::db::DatabaseError;
use crate::models::{JobKind, JobState};

#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: String,
    pub job_type: JobKind,
    pub natural_key: String,
    pub status: JobState,
    pub input_hash: String,
    /// Natural key of the artifact the job produced, if any.
    pub result_key: Option<String>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JobStatus {
    /// Deterministic job id for a (kind, natural key) pair.
    pub fn id_for(kind: JobKind, natural_key: &str) -> String {
        format!("{}:{}", kind.as_str(), natural_key)
    }

    pub fn new(kind: JobKind, natural_key: &str, input_hash: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Self::id_for(kind, natural_key),
            job_type: kind,
            natural_key: natural_key.to_string(),
            status: JobState::Pending,
            input_hash: input_hash.to_string(),
            result_key: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Insert or update a job row.
///
/// A row already in a terminal state is left untouched unless the incoming
/// status is also terminal (reprocessing may flip succeeded → succeeded with
/// a fresh input hash, never terminal → pending/running).
pub fn upsert_job_status(conn: &Connection, job: &JobStatus) -> Result<(), DatabaseError> {
    if let Some(existing) = get_job_status(conn, &job.id)? {
        if existing.status.is_terminal() && !job.status.is_terminal() {
            tracing::debug!(
                job_id = %job.id,
                existing = existing.status.as_str(),
                incoming = job.status.as_str(),
                "Ignoring status regression on terminal job"
            );
            return Ok(());
        }
    }
    conn.execute(
        "INSERT INTO job_status
           (id, job_type, natural_key, status, input_hash, result_key, last_error, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
           status = excluded.status,
           input_hash = excluded.input_hash,
           result_key = excluded.result_key,
           last_error = excluded.last_error,
           updated_at = excluded.updated_at",
        params![
            job.id,
            job.job_type.as_str(),
            job.natural_key,
            job.status.as_str(),
            job.input_hash,
            job.result_key,
            job.last_error,
            job.created_at.format(TS_FORMAT).to_string(),
            now_str(),
        ],
    )?;
    Ok(())
}

pub fn get_job_status(conn: &Connection, id: &str) -> Result<Option<JobStatus>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT id, job_type, natural_key, status, input_hash, result_key, last_error,
                    created_at, updated_at
             FROM job_status WHERE id = ?1",
            params![id],
            row_to_job,
        )
        .optional()?;
    Ok(job)
}

/// Find a succeeded job for (kind, input hash). Dispatching a job whose
/// inputs already succeeded is a no-op.
pub fn get_job_by_input(
    conn: &Connection,
    kind: JobKind,
    input_hash: &str,
) -> Result<Option<JobStatus>, DatabaseError> {
    let job = conn
        .query_row(
            "SELECT id, job_type, natural_key, status, input_hash, result_key, last_error,
                    created_at, updated_at
             FROM job_status
             WHERE job_type = ?1 AND input_hash = ?2 AND status = 'succeeded'
             LIMIT 1",
            params![kind.as_str(), input_hash],
            row_to_job,
        )
        .optional()?;
    Ok(job)
}

/// All dead-lettered jobs, oldest first. Feeds the status warnings.
pub fn list_dead_lettered(conn: &Connection) -> Result<Vec<JobStatus>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, job_type, natural_key, status, input_hash, result_key, last_error,
                created_at, updated_at
         FROM job_status WHERE status = 'dead_lettered'
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], row_to_job)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Delete pending/running rows. Terminal rows survive a reset so a re-run
/// can still no-op on a matching (type, input-hash).
pub fn clear_non_terminal_jobs(conn: &Connection) -> Result<u64, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM job_status WHERE status IN ('pending', 'running')",
        [],
    )?;
    Ok(affected as u64)
}

fn row_to_job(row: &Row) -> Result<JobStatus, rusqlite::Error> {
    let type_str: String = row.get(1)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;
    Ok(JobStatus {
        id: row.get(0)?,
        job_type: JobKind::from_str(&type_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        natural_key: row.get(2)?,
        status: JobState::from_str(&status_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        input_hash: row.get(4)?,
        result_key: row.get(5)?,
        last_error: row.get(6)?,
        created_at: NaiveDateTime::parse_from_str(&created_str, TS_FORMAT).unwrap_or_default(),
        updated_at: NaiveDateTime::parse_from_str(&updated_str, TS_FORMAT).unwrap_or_default(),
    })
}
