use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_body, now_str, to_body};
use crate::db::DatabaseError;
use crate::models::QuarterlyNotepad;

#[derive(Debug, Clone)]
pub struct StoredQuarterly {
    pub notepad: QuarterlyNotepad,
    pub input_hash: String,
}

pub fn store_quarterly_notepad(
    conn: &Connection,
    notepad: &QuarterlyNotepad,
    input_hash: &str,
) -> Result<(), DatabaseError> {
    let key = notepad.natural_key();
    let body = to_body(&key, notepad)?;
    conn.execute(
        "INSERT INTO quarterly_notepads (id, quarter, input_hash, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(quarter) DO UPDATE SET
           input_hash = excluded.input_hash,
           body = excluded.body",
        params![Uuid::new_v4().to_string(), key, input_hash, body, now_str()],
    )?;
    Ok(())
}

pub fn get_quarterly_notepad(
    conn: &Connection,
    quarter: &str,
) -> Result<Option<StoredQuarterly>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT body, input_hash FROM quarterly_notepads WHERE quarter = ?1",
            params![quarter],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((body, input_hash)) => Ok(Some(StoredQuarterly {
            notepad: from_body(quarter, &body)?,
            input_hash,
        })),
        None => Ok(None),
    }
}

/// Every persisted notepad in calendar order. `YYYY-QN` sorts
/// lexicographically in calendar order, so the index does the work.
pub fn get_all_quarterly_notepads(
    conn: &Connection,
) -> Result<Vec<QuarterlyNotepad>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT quarter, body FROM quarterly_notepads ORDER BY quarter ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (key, body) = row?;
        out.push(from_body(&key, &body)?);
    }
    Ok(out)
}
