use serde::{Deserialize, Serialize};

/// Natural key of the singleton synthesis artifact.
pub const SYNTHESIS_KEY: &str = "main";

/// Headline metrics for one quarter, as consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterMetric {
    /// `YYYY-QN`.
    pub quarter: String,
    pub avg_mood: Option<f64>,
    pub avg_energy: Option<f64>,
    pub happiness_index: Option<f64>,
}

/// Observed relationship between one medication and the journal record.
/// Fields are null for periods the corpus simply does not cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationCorrelation {
    pub medication: String,
    /// Human-readable span the correlation covers, e.g. "2024-03 to 2024-09".
    pub period: Option<String>,
    pub observed_effects: Option<String>,
    /// Mood delta attributed to the period, on the 1-10 scale.
    pub mood_shift: Option<f64>,
}

/// How one significant relationship moved across the two years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipArc {
    pub name: String,
    pub relationship: String,
    pub arc: String,
}

/// One dated milestone on the two-year timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMilestone {
    /// ISO date or `YYYY-MM` when the exact day is not recorded.
    pub date: String,
    pub title: String,
    pub significance: String,
}

/// The singleton tier-4 artifact: the whole two-year span in one record.
/// Keyed by the literal `main`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    /// One-sentence thesis of the two years.
    pub thesis: String,
    /// Who the author was before the identity milestone.
    pub identity_before: String,
    /// Who the author became after it.
    pub identity_after: String,
    /// One element per quarterly notepad consumed, in calendar order.
    pub quarter_metrics: Vec<QuarterMetric>,
    pub weekly_patterns: Option<String>,
    pub seasonal_patterns: Option<String>,
    pub medication_correlations: Vec<MedicationCorrelation>,
    pub relationship_arcs: Vec<RelationshipArc>,
    pub milestones: Vec<TimelineMilestone>,
    pub strengths: Vec<String>,
    pub challenges: Vec<String>,
    pub growth_areas: Vec<String>,
    pub executive_summary: String,
    pub narrative: String,
}

impl Synthesis {
    pub fn natural_key(&self) -> String {
        SYNTHESIS_KEY.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> Synthesis {
        Synthesis {
            thesis: "Two years of slow, compounding change.".into(),
            identity_before: "Guarded, running on borrowed energy.".into(),
            identity_after: "Settled into a name and a routine that fit.".into(),
            quarter_metrics: vec![QuarterMetric {
                quarter: "2025-Q1".into(),
                avg_mood: Some(6.2),
                avg_energy: Some(5.5),
                happiness_index: Some(6.5),
            }],
            weekly_patterns: Some("Mood dips midweek, recovers on weekends.".into()),
            seasonal_patterns: None,
            medication_correlations: vec![MedicationCorrelation {
                medication: "estradiol".into(),
                period: Some("2024-03 to 2025-12".into()),
                observed_effects: Some("Steadier baseline mood after month two.".into()),
                mood_shift: Some(1.2),
            }],
            relationship_arcs: vec![],
            milestones: vec![],
            strengths: vec!["consistency".into()],
            challenges: vec!["sleep".into()],
            growth_areas: vec!["asking for help".into()],
            executive_summary: "A two-year arc from depletion to stability.".into(),
            narrative: "The record opens in a hard winter.".into(),
        }
    }

    #[test]
    fn natural_key_is_main() {
        assert_eq!(sample().natural_key(), "main");
    }

    #[test]
    fn missing_periods_serialize_as_null() {
        let s = sample();
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["seasonal_patterns"].is_null());
    }
}
