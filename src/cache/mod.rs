//! Content cache: key-value rows with a TTL, keyed by content hash.
//!
//! A hit means the artifact body for that exact input content is known and
//! the LLM call can be skipped. A miss means nothing — workers still check
//! the persistence layer before calling the model. Bodies are re-validated
//! by the caller before reuse; a cached body can predate a schema change.

use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::repository::TS_FORMAT;
use crate::db::DatabaseError;
use crate::models::Tier;

/// Default TTL: long relative to any single pipeline run.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cache key for one entry extraction.
pub fn extraction_key(date: chrono::NaiveDate, content_hash: &str) -> String {
    format!(
        "extract:{}:{}",
        date.format("%Y-%m-%d"),
        short_hash(content_hash)
    )
}

/// Cache key for one aggregation artifact.
pub fn aggregation_key(tier: Tier, range_id: &str, input_hash: &str) -> String {
    format!(
        "agg:{}:{}:{}",
        tier.as_str(),
        range_id,
        short_hash(input_hash)
    )
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(16)]
}

/// Fetch a cached body if present and not expired. Expired rows are
/// deleted on the way out.
pub fn cache_get(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT body, expires_at FROM content_cache WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((body, expires_str)) = row else {
        return Ok(None);
    };
    let expired = NaiveDateTime::parse_from_str(&expires_str, TS_FORMAT)
        .map(|expires| expires <= Utc::now().naive_utc())
        .unwrap_or(true);
    if expired {
        conn.execute("DELETE FROM content_cache WHERE key = ?1", params![key])?;
        return Ok(None);
    }
    Ok(Some(body))
}

pub fn cache_put(
    conn: &Connection,
    key: &str,
    body: &str,
    ttl: Duration,
) -> Result<(), DatabaseError> {
    let expires_at = Utc::now().naive_utc() + chrono::Duration::seconds(ttl.as_secs() as i64);
    conn.execute(
        "INSERT INTO content_cache (key, body, expires_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           body = excluded.body,
           expires_at = excluded.expires_at",
        params![key, body, expires_at.format(TS_FORMAT).to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn put_then_get() {
        let conn = open_memory_database().unwrap();
        cache_put(&conn, "extract:2025-03-03:abcd", "{\"x\":1}", DEFAULT_TTL).unwrap();
        let got = cache_get(&conn, "extract:2025-03-03:abcd").unwrap();
        assert_eq!(got.as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn miss_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(cache_get(&conn, "agg:weekly:2025-03-03:ffff")
            .unwrap()
            .is_none());
    }

    #[test]
    fn expired_row_is_dropped() {
        let conn = open_memory_database().unwrap();
        cache_put(&conn, "k", "v", Duration::from_secs(0)).unwrap();
        assert!(cache_get(&conn, "k").unwrap().is_none());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM content_cache", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn keys_use_hash_prefix() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let hash = "0123456789abcdef0123456789abcdef";
        assert_eq!(
            extraction_key(date, hash),
            "extract:2025-03-03:0123456789abcdef"
        );
        assert_eq!(
            aggregation_key(Tier::Weekly, "2025-03-03", hash),
            "agg:weekly:2025-03-03:0123456789abcdef"
        );
        // Shorter hashes are used whole.
        assert_eq!(extraction_key(date, "ab"), "extract:2025-03-03:ab");
    }
}
