use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_body, now_str, to_body};
use crate::db::DatabaseError;
use crate::models::WeeklySummary;

#[derive(Debug, Clone)]
pub struct StoredWeekly {
    pub summary: WeeklySummary,
    pub input_hash: String,
}

pub fn store_weekly_summary(
    conn: &Connection,
    summary: &WeeklySummary,
    input_hash: &str,
) -> Result<(), DatabaseError> {
    let key = summary.natural_key();
    let body = to_body(&key, summary)?;
    conn.execute(
        "INSERT INTO weekly_summaries (id, week_start, input_hash, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(week_start) DO UPDATE SET
           input_hash = excluded.input_hash,
           body = excluded.body",
        params![Uuid::new_v4().to_string(), key, input_hash, body, now_str()],
    )?;
    Ok(())
}

pub fn get_weekly_summary(
    conn: &Connection,
    week_start: NaiveDate,
) -> Result<Option<StoredWeekly>, DatabaseError> {
    let key = week_start.format("%Y-%m-%d").to_string();
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT body, input_hash FROM weekly_summaries WHERE week_start = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((body, input_hash)) => Ok(Some(StoredWeekly {
            summary: from_body(&key, &body)?,
            input_hash,
        })),
        None => Ok(None),
    }
}

/// All weekly summaries whose `week_start` falls inside the given `YYYY-MM`
/// month, ascending. A week straddling a month boundary belongs to the month
/// its start date is in — exactly one month claims each weekly.
pub fn get_weekly_summaries_for_month(
    conn: &Connection,
    month: &str,
) -> Result<Vec<WeeklySummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT week_start, body FROM weekly_summaries
         WHERE substr(week_start, 1, 7) = ?1
         ORDER BY week_start ASC",
    )?;
    let rows = stmt.query_map(params![month], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (key, body) = row?;
        out.push(from_body(&key, &body)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::weekly::tests::sample;

    #[test]
    fn store_then_get_round_trips() {
        let conn = open_memory_database().unwrap();
        let week_start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let s = sample(week_start);
        store_weekly_summary(&conn, &s, "ih").unwrap();

        let stored = get_weekly_summary(&conn, week_start).unwrap().unwrap();
        assert_eq!(stored.summary, s);
        assert_eq!(stored.input_hash, "ih");
    }

    #[test]
    fn month_query_matches_week_start_month_only() {
        let conn = open_memory_database().unwrap();
        // 2025-03-31 is a Monday; its week spills into April but belongs to March.
        for (y, m, d) in [(2025, 3, 3), (2025, 3, 31), (2025, 4, 7)] {
            let ws = NaiveDate::from_ymd_opt(y, m, d).unwrap();
            store_weekly_summary(&conn, &sample(ws), "ih").unwrap();
        }
        let march = get_weekly_summaries_for_month(&conn, "2025-03").unwrap();
        assert_eq!(march.len(), 2);
        assert_eq!(
            march[1].week_start,
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
        );

        let april = get_weekly_summaries_for_month(&conn, "2025-04").unwrap();
        assert_eq!(april.len(), 1);
    }
}
