use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::TrendLabel;

/// Tier-2 artifact spanning one calendar month. Keyed by `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// `YYYY-MM`.
    pub month: String,
    /// Composite 1-10 index for the month.
    pub happiness_index: f64,
    pub trajectory: TrendLabel,
    /// Health score per relationship category ("partner", "friends", ...),
    /// 1-10. BTreeMap keeps serialization order deterministic.
    pub relationship_health: BTreeMap<String, f64>,
    pub top_themes: Vec<String>,
    pub milestones: Vec<String>,
    pub challenges: Vec<String>,
    pub wins: Vec<String>,
    pub medication_notes: Option<String>,
    pub sleep_summary: Option<String>,
    /// 2-3 paragraph narrative.
    pub narrative: String,
}

impl MonthlySummary {
    pub fn natural_key(&self) -> String {
        self.month.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(month: &str) -> MonthlySummary {
        let mut relationship_health = BTreeMap::new();
        relationship_health.insert("friends".to_string(), 7.0);
        MonthlySummary {
            month: month.to_string(),
            happiness_index: 6.5,
            trajectory: TrendLabel::Improving,
            relationship_health,
            top_themes: vec!["recovery".into()],
            milestones: vec![],
            challenges: vec!["sleep debt".into()],
            wins: vec!["kept the journal daily".into()],
            medication_notes: None,
            sleep_summary: Some("Irregular early, settling by mid-month.".into()),
            narrative: "March opened rough and closed steadier.".into(),
        }
    }

    #[test]
    fn natural_key_is_month() {
        assert_eq!(sample("2025-03").natural_key(), "2025-03");
    }
}
