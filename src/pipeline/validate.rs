//! Post-parse validation of model-produced artifacts. Applied to fresh
//! completions AND to cache hits — a cached body can predate a schema
//! change. A violation fails the job (one retry, then dead-letter); nothing
//! is silently truncated or clamped.

use chrono::NaiveDate;

use crate::models::{Extraction, MonthlySummary, QuarterlyNotepad, Synthesis, WeeklySummary};

const MAX_THEMES: usize = 5;
const MAX_QUOTES: usize = 3;

type Violations = Vec<String>;

fn check_score(violations: &mut Violations, field: &str, value: u8) {
    if !(1..=10).contains(&value) {
        violations.push(format!("{field} is {value}, expected 1-10"));
    }
}

fn check_score_f64(violations: &mut Violations, field: &str, value: f64) {
    if !(1.0..=10.0).contains(&value) || !value.is_finite() {
        violations.push(format!("{field} is {value}, expected 1-10"));
    }
}

fn check_sentiment(violations: &mut Violations, field: &str, value: f32) {
    if !(-1.0..=1.0).contains(&value) || !value.is_finite() {
        violations.push(format!("{field} is {value}, expected -1.0 to 1.0"));
    }
}

fn check_nonempty(violations: &mut Violations, field: &str, value: &str) {
    if value.trim().is_empty() {
        violations.push(format!("{field} is empty"));
    }
}

fn finish(violations: Violations) -> Result<(), String> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations.join("; "))
    }
}

/// Enforce the extraction shape: scores in range, caps honored, date echoed
/// correctly.
pub fn validate_extraction(e: &Extraction, expected_date: NaiveDate) -> Result<(), String> {
    let mut v = Violations::new();
    if e.date != expected_date {
        v.push(format!(
            "date is {}, expected {expected_date}",
            e.date
        ));
    }
    check_score(&mut v, "mood_score", e.mood_score);
    check_score(&mut v, "energy_level", e.energy_level);
    if let Some(quality) = e.sleep.quality {
        check_score(&mut v, "sleep.quality", quality);
    }
    if !e.sleep.mentioned && e.sleep.quality.is_some() {
        v.push("sleep.quality set although sleep is not mentioned".into());
    }
    if e.dominant_themes.len() > MAX_THEMES {
        v.push(format!(
            "dominant_themes has {} items, cap is {MAX_THEMES}",
            e.dominant_themes.len()
        ));
    }
    if e.key_quotes.len() > MAX_QUOTES {
        v.push(format!(
            "key_quotes has {} items, cap is {MAX_QUOTES}",
            e.key_quotes.len()
        ));
    }
    for (i, person) in e.people.iter().enumerate() {
        check_nonempty(&mut v, &format!("people[{i}].name"), &person.name);
        check_sentiment(&mut v, &format!("people[{i}].sentiment"), person.sentiment);
    }
    check_nonempty(&mut v, "summary", &e.summary);
    finish(v)
}

pub fn validate_weekly(w: &WeeklySummary, expected_week_start: NaiveDate) -> Result<(), String> {
    let mut v = Violations::new();
    if w.week_start != expected_week_start {
        v.push(format!(
            "week_start is {}, expected {expected_week_start}",
            w.week_start
        ));
    }
    check_score_f64(&mut v, "avg_mood", w.avg_mood);
    check_score_f64(&mut v, "avg_energy", w.avg_energy);
    for (i, person) in w.people_seen.iter().enumerate() {
        check_nonempty(&mut v, &format!("people_seen[{i}].name"), &person.name);
        if person.count == 0 {
            v.push(format!("people_seen[{i}].count is 0"));
        }
        check_sentiment(
            &mut v,
            &format!("people_seen[{i}].avg_sentiment"),
            person.avg_sentiment,
        );
    }
    check_nonempty(&mut v, "narrative", &w.narrative);
    finish(v)
}

pub fn validate_monthly(m: &MonthlySummary, expected_month: &str) -> Result<(), String> {
    let mut v = Violations::new();
    if m.month != expected_month {
        v.push(format!("month is {}, expected {expected_month}", m.month));
    }
    check_score_f64(&mut v, "happiness_index", m.happiness_index);
    for (category, score) in &m.relationship_health {
        check_score_f64(&mut v, &format!("relationship_health.{category}"), *score);
    }
    check_nonempty(&mut v, "narrative", &m.narrative);
    finish(v)
}

/// `expected_points` is the number of monthly inputs the aggregator fed in;
/// the trajectory arrays must carry exactly one value per month.
pub fn validate_quarterly(
    q: &QuarterlyNotepad,
    expected_quarter: &str,
    expected_points: usize,
) -> Result<(), String> {
    let mut v = Violations::new();
    if q.quarter != expected_quarter {
        v.push(format!(
            "quarter is {}, expected {expected_quarter}",
            q.quarter
        ));
    }
    if q.mood_trajectory.len() != expected_points {
        v.push(format!(
            "mood_trajectory has {} points, expected {expected_points}",
            q.mood_trajectory.len()
        ));
    }
    if q.energy_trajectory.len() != expected_points {
        v.push(format!(
            "energy_trajectory has {} points, expected {expected_points}",
            q.energy_trajectory.len()
        ));
    }
    for (i, value) in q.mood_trajectory.iter().enumerate() {
        check_score_f64(&mut v, &format!("mood_trajectory[{i}]"), *value);
    }
    for (i, value) in q.energy_trajectory.iter().enumerate() {
        check_score_f64(&mut v, &format!("energy_trajectory[{i}]"), *value);
    }
    check_nonempty(&mut v, "chapter_title", &q.chapter_title);
    check_nonempty(&mut v, "narrative", &q.narrative);
    finish(v)
}

/// `expected_quarters` is the number of notepads fed in.
pub fn validate_synthesis(s: &Synthesis, expected_quarters: usize) -> Result<(), String> {
    let mut v = Violations::new();
    if s.quarter_metrics.len() != expected_quarters {
        v.push(format!(
            "quarter_metrics has {} elements, expected {expected_quarters}",
            s.quarter_metrics.len()
        ));
    }
    for (i, metric) in s.quarter_metrics.iter().enumerate() {
        if let Some(mood) = metric.avg_mood {
            check_score_f64(&mut v, &format!("quarter_metrics[{i}].avg_mood"), mood);
        }
        if let Some(energy) = metric.avg_energy {
            check_score_f64(&mut v, &format!("quarter_metrics[{i}].avg_energy"), energy);
        }
        if let Some(happiness) = metric.happiness_index {
            check_score_f64(
                &mut v,
                &format!("quarter_metrics[{i}].happiness_index"),
                happiness,
            );
        }
    }
    check_nonempty(&mut v, "thesis", &s.thesis);
    check_nonempty(&mut v, "executive_summary", &s.executive_summary);
    check_nonempty(&mut v, "narrative", &s.narrative);
    finish(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extraction::tests::sample;
    use crate::models::weekly::tests::sample as weekly_sample;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn valid_extraction_passes() {
        let e = sample(d(2025, 3, 3));
        assert!(validate_extraction(&e, d(2025, 3, 3)).is_ok());
    }

    #[test]
    fn out_of_range_scores_fail() {
        let mut e = sample(d(2025, 3, 3));
        e.mood_score = 0;
        e.energy_level = 11;
        let err = validate_extraction(&e, d(2025, 3, 3)).unwrap_err();
        assert!(err.contains("mood_score"));
        assert!(err.contains("energy_level"));
    }

    #[test]
    fn theme_cap_is_enforced_not_truncated() {
        let mut e = sample(d(2025, 3, 3));
        e.dominant_themes = (0..8).map(|i| format!("theme-{i}")).collect();
        let err = validate_extraction(&e, d(2025, 3, 3)).unwrap_err();
        assert!(err.contains("dominant_themes has 8"));
        // The artifact itself is untouched.
        assert_eq!(e.dominant_themes.len(), 8);
    }

    #[test]
    fn quote_cap_is_enforced() {
        let mut e = sample(d(2025, 3, 3));
        e.key_quotes = (0..4).map(|i| format!("quote {i}")).collect();
        assert!(validate_extraction(&e, d(2025, 3, 3)).is_err());
    }

    #[test]
    fn date_echo_mismatch_fails() {
        let e = sample(d(2025, 3, 3));
        assert!(validate_extraction(&e, d(2025, 3, 4)).is_err());
    }

    #[test]
    fn null_sleep_quality_is_fine_when_unmentioned() {
        let mut e = sample(d(2025, 3, 3));
        e.sleep.mentioned = false;
        e.sleep.quality = None;
        assert!(validate_extraction(&e, d(2025, 3, 3)).is_ok());

        e.sleep.quality = Some(6);
        assert!(validate_extraction(&e, d(2025, 3, 3)).is_err());
    }

    #[test]
    fn sentiment_bounds_are_enforced() {
        let mut e = sample(d(2025, 3, 3));
        e.people[0].sentiment = 1.5;
        assert!(validate_extraction(&e, d(2025, 3, 3)).is_err());
    }

    #[test]
    fn weekly_average_bounds() {
        let mut w = weekly_sample(d(2025, 3, 3));
        assert!(validate_weekly(&w, d(2025, 3, 3)).is_ok());
        w.avg_mood = 0.0;
        assert!(validate_weekly(&w, d(2025, 3, 3)).is_err());
    }

    #[test]
    fn quarterly_trajectory_length_must_match_inputs() {
        let q = crate::models::quarterly::tests::sample("2025-Q1");
        assert!(validate_quarterly(&q, "2025-Q1", 3).is_ok());
        assert!(validate_quarterly(&q, "2025-Q1", 2).is_err());
        assert!(validate_quarterly(&q, "2025-Q2", 3).is_err());
    }

    #[test]
    fn synthesis_metric_count_must_match_inputs() {
        let s = crate::models::synthesis::tests::sample();
        assert!(validate_synthesis(&s, 1).is_ok());
        assert!(validate_synthesis(&s, 8).is_err());
    }
}
