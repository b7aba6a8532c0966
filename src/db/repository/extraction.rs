use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_body, now_str, to_body};
use crate::db::DatabaseError;
use crate::models::Extraction;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A persisted extraction plus the input hash it was produced from.
#[derive(Debug, Clone)]
pub struct StoredExtraction {
    pub extraction: Extraction,
    pub input_hash: String,
}

/// Insert or replace the extraction for its entry date.
pub fn store_extraction(
    conn: &Connection,
    extraction: &Extraction,
    input_hash: &str,
) -> Result<(), DatabaseError> {
    let key = extraction.natural_key();
    let body = to_body(&key, extraction)?;
    conn.execute(
        "INSERT INTO extractions (id, entry_date, input_hash, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(entry_date) DO UPDATE SET
           input_hash = excluded.input_hash,
           body = excluded.body",
        params![Uuid::new_v4().to_string(), key, input_hash, body, now_str()],
    )?;
    Ok(())
}

pub fn get_extraction(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Option<StoredExtraction>, DatabaseError> {
    let key = date.format(DATE_FORMAT).to_string();
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT body, input_hash FROM extractions WHERE entry_date = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((body, input_hash)) => Ok(Some(StoredExtraction {
            extraction: from_body(&key, &body)?,
            input_hash,
        })),
        None => Ok(None),
    }
}

/// All extractions with `date ∈ [start, end]`, ascending by date.
pub fn get_extractions_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Extraction>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT entry_date, body FROM extractions
         WHERE entry_date >= ?1 AND entry_date <= ?2
         ORDER BY entry_date ASC",
    )?;
    let rows = stmt.query_map(
        params![
            start.format(DATE_FORMAT).to_string(),
            end.format(DATE_FORMAT).to_string()
        ],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;
    let mut out = Vec::new();
    for row in rows {
        let (key, body) = row?;
        out.push(from_body(&key, &body)?);
    }
    Ok(out)
}
