use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_body, now_str, to_body};
use crate::db::DatabaseError;
use crate::models::MonthlySummary;

#[derive(Debug, Clone)]
pub struct StoredMonthly {
    pub summary: MonthlySummary,
    pub input_hash: String,
}

pub fn store_monthly_summary(
    conn: &Connection,
    summary: &MonthlySummary,
    input_hash: &str,
) -> Result<(), DatabaseError> {
    let key = summary.natural_key();
    let body = to_body(&key, summary)?;
    conn.execute(
        "INSERT INTO monthly_summaries (id, month, input_hash, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(month) DO UPDATE SET
           input_hash = excluded.input_hash,
           body = excluded.body",
        params![Uuid::new_v4().to_string(), key, input_hash, body, now_str()],
    )?;
    Ok(())
}

pub fn get_monthly_summary(
    conn: &Connection,
    month: &str,
) -> Result<Option<StoredMonthly>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT body, input_hash FROM monthly_summaries WHERE month = ?1",
            params![month],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((body, input_hash)) => Ok(Some(StoredMonthly {
            summary: from_body(month, &body)?,
            input_hash,
        })),
        None => Ok(None),
    }
}

/// The (up to three) monthly summaries of a `YYYY-QN` quarter, ascending.
pub fn get_monthly_summaries_for_quarter(
    conn: &Connection,
    quarter: &str,
) -> Result<Vec<MonthlySummary>, DatabaseError> {
    let months = quarter_months(quarter)?;
    let mut stmt = conn.prepare(
        "SELECT month, body FROM monthly_summaries
         WHERE month IN (?1, ?2, ?3)
         ORDER BY month ASC",
    )?;
    let rows = stmt.query_map(params![months[0], months[1], months[2]], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (key, body) = row?;
        out.push(from_body(&key, &body)?);
    }
    Ok(out)
}

fn quarter_months(quarter: &str) -> Result<[String; 3], DatabaseError> {
    let invalid = || DatabaseError::InvalidEnum {
        field: "quarter".into(),
        value: quarter.into(),
    };
    let (year, q) = quarter.split_once("-Q").ok_or_else(invalid)?;
    let q: u32 = q.parse().map_err(|_| invalid())?;
    if !(1..=4).contains(&q) || year.len() != 4 || year.parse::<u32>().is_err() {
        return Err(invalid());
    }
    let first = (q - 1) * 3 + 1;
    Ok([
        format!("{year}-{:02}", first),
        format!("{year}-{:02}", first + 1),
        format!("{year}-{:02}", first + 2),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::monthly::tests::sample;

    #[test]
    fn store_then_get_round_trips() {
        let conn = open_memory_database().unwrap();
        let s = sample("2025-03");
        store_monthly_summary(&conn, &s, "ih").unwrap();
        let stored = get_monthly_summary(&conn, "2025-03").unwrap().unwrap();
        assert_eq!(stored.summary, s);
    }

    #[test]
    fn quarter_query_returns_constituent_months_in_order() {
        let conn = open_memory_database().unwrap();
        for month in ["2025-02", "2025-01", "2025-03", "2025-04"] {
            store_monthly_summary(&conn, &sample(month), "ih").unwrap();
        }
        let q1 = get_monthly_summaries_for_quarter(&conn, "2025-Q1").unwrap();
        let months: Vec<&str> = q1.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);
    }

    #[test]
    fn quarter_months_mapping() {
        assert_eq!(
            quarter_months("2024-Q4").unwrap(),
            ["2024-10".to_string(), "2024-11".into(), "2024-12".into()]
        );
        assert!(quarter_months("2024-Q5").is_err());
        assert!(quarter_months("nonsense").is_err());
    }
}
