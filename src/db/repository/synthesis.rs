use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_body, now_str, to_body};
use crate::db::DatabaseError;
use crate::models::synthesis::SYNTHESIS_KEY;
use crate::models::Synthesis;

#[derive(Debug, Clone)]
pub struct StoredSynthesis {
    pub synthesis: Synthesis,
    pub input_hash: String,
}

pub fn store_synthesis(
    conn: &Connection,
    synthesis: &Synthesis,
    input_hash: &str,
) -> Result<(), DatabaseError> {
    let body = to_body(SYNTHESIS_KEY, synthesis)?;
    conn.execute(
        "INSERT INTO syntheses (id, natural_key, input_hash, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(natural_key) DO UPDATE SET
           input_hash = excluded.input_hash,
           body = excluded.body",
        params![
            Uuid::new_v4().to_string(),
            SYNTHESIS_KEY,
            input_hash,
            body,
            now_str()
        ],
    )?;
    Ok(())
}

pub fn get_synthesis(conn: &Connection) -> Result<Option<StoredSynthesis>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT body, input_hash FROM syntheses WHERE natural_key = ?1",
            params![SYNTHESIS_KEY],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((body, input_hash)) => Ok(Some(StoredSynthesis {
            synthesis: from_body(SYNTHESIS_KEY, &body)?,
            input_hash,
        })),
        None => Ok(None),
    }
}
