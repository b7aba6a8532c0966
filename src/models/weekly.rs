use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::TrendLabel;

/// Per-person aggregate over one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSeen {
    pub name: String,
    /// Number of entries in the week mentioning this person.
    pub count: u32,
    /// Mean sentiment across those mentions, -1.0 to 1.0.
    pub avg_sentiment: f32,
}

/// Tier-1 artifact spanning seven consecutive calendar days.
/// Keyed by week-start date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub avg_mood: f64,
    pub avg_energy: f64,
    pub trend: TrendLabel,
    pub people_seen: Vec<PersonSeen>,
    pub dominant_themes: Vec<String>,
    pub notable_events: Vec<String>,
    /// Recurring-cycle observation for the week, if any.
    pub cycle_patterns: Option<String>,
    /// One-paragraph narrative.
    pub narrative: String,
}

impl WeeklySummary {
    pub fn natural_key(&self) -> String {
        self.week_start.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(week_start: NaiveDate) -> WeeklySummary {
        WeeklySummary {
            week_start,
            avg_mood: 6.3,
            avg_energy: 5.7,
            trend: TrendLabel::Stable,
            people_seen: vec![PersonSeen {
                name: "Sam".into(),
                count: 2,
                avg_sentiment: 0.5,
            }],
            dominant_themes: vec!["rest".into()],
            notable_events: vec![],
            cycle_patterns: None,
            narrative: "A steady week anchored by routine.".into(),
        }
    }

    #[test]
    fn natural_key_is_week_start() {
        let s = sample(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(s.natural_key(), "2025-03-03");
    }
}
