//! Singleton pipeline state row. The coordinator is its only writer.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::TS_FORMAT;
use crate::db::DatabaseError;
use crate::models::{PipelinePhase, Tier};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub phase: PipelinePhase,
    pub total_entries: u32,
    pub processed_entries: u32,
    pub current_tier: Option<Tier>,
    pub warnings: Vec<String>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            phase: PipelinePhase::Idle,
            total_entries: 0,
            processed_entries: 0,
            current_tier: None,
            warnings: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }
}

pub fn put_pipeline_state(conn: &Connection, state: &PipelineState) -> Result<(), DatabaseError> {
    let warnings = serde_json::to_string(&state.warnings).map_err(|e| {
        DatabaseError::CorruptBody {
            key: "pipeline_state".into(),
            reason: e.to_string(),
        }
    })?;
    conn.execute(
        "INSERT INTO pipeline_state
           (id, phase, total_entries, processed_entries, current_tier, warnings, started_at, completed_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           phase = excluded.phase,
           total_entries = excluded.total_entries,
           processed_entries = excluded.processed_entries,
           current_tier = excluded.current_tier,
           warnings = excluded.warnings,
           started_at = excluded.started_at,
           completed_at = excluded.completed_at",
        params![
            state.phase.as_str(),
            state.total_entries,
            state.processed_entries,
            state.current_tier.map(|t| t.as_str()),
            warnings,
            state.started_at.map(|t| t.format(TS_FORMAT).to_string()),
            state.completed_at.map(|t| t.format(TS_FORMAT).to_string()),
        ],
    )?;
    Ok(())
}

/// Current state, or the idle default when no row exists.
pub fn get_pipeline_state(conn: &Connection) -> Result<PipelineState, DatabaseError> {
    let state = conn
        .query_row(
            "SELECT phase, total_entries, processed_entries, current_tier, warnings,
                    started_at, completed_at
             FROM pipeline_state WHERE id = 1",
            [],
            row_to_state,
        )
        .optional()?;
    Ok(state.unwrap_or_default())
}

/// Delete the state row. Artifacts are untouched.
pub fn clear_pipeline_state(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM pipeline_state WHERE id = 1", [])?;
    Ok(())
}

fn row_to_state(row: &Row) -> Result<PipelineState, rusqlite::Error> {
    let phase_str: String = row.get(0)?;
    let tier_str: Option<String> = row.get(3)?;
    let warnings_str: String = row.get(4)?;
    let started_str: Option<String> = row.get(5)?;
    let completed_str: Option<String> = row.get(6)?;
    Ok(PipelineState {
        phase: PipelinePhase::from_str(&phase_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        total_entries: row.get(1)?,
        processed_entries: row.get(2)?,
        current_tier: match tier_str {
            Some(s) => Some(Tier::from_str(&s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        },
        warnings: serde_json::from_str(&warnings_str).unwrap_or_default(),
        started_at: started_str.and_then(|s| NaiveDateTime::parse_from_str(&s, TS_FORMAT).ok()),
        completed_at: completed_str.and_then(|s| NaiveDateTime::parse_from_str(&s, TS_FORMAT).ok()),
    })
}
