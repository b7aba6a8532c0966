use serde::{Deserialize, Serialize};

/// Trajectory of one frequently-mentioned person across a quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonTrajectory {
    pub name: String,
    /// Total mentions across the quarter's months.
    pub mentions: u32,
    /// Free-text arc: "deepening", "fading", "steady", ...
    pub trajectory: String,
}

/// Tier-3 artifact spanning three consecutive calendar months.
/// Keyed by `YYYY-QN` where N is 1-4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyNotepad {
    /// `YYYY-QN`.
    pub quarter: String,
    /// Chapter-style title for the quarter.
    pub chapter_title: String,
    /// One point per constituent month, in calendar order.
    pub mood_trajectory: Vec<f64>,
    /// One point per constituent month, in calendar order.
    pub energy_trajectory: Vec<f64>,
    /// Where the author stood entering the quarter.
    pub opening_state: String,
    /// Where the author stood leaving it.
    pub closing_state: String,
    pub key_people: Vec<PersonTrajectory>,
    pub dominant_themes: Vec<String>,
    /// 4-6 paragraph narrative.
    pub narrative: String,
}

impl QuarterlyNotepad {
    pub fn natural_key(&self) -> String {
        self.quarter.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(quarter: &str) -> QuarterlyNotepad {
        QuarterlyNotepad {
            quarter: quarter.to_string(),
            chapter_title: "Finding Footing".into(),
            mood_trajectory: vec![5.8, 6.2, 6.6],
            energy_trajectory: vec![5.1, 5.5, 6.0],
            opening_state: "Worn down, uncertain.".into(),
            closing_state: "Cautiously settled.".into(),
            key_people: vec![PersonTrajectory {
                name: "Sam".into(),
                mentions: 14,
                trajectory: "steady".into(),
            }],
            dominant_themes: vec!["stability".into()],
            narrative: "The quarter traced a slow climb.".into(),
        }
    }

    #[test]
    fn natural_key_is_quarter() {
        assert_eq!(sample("2025-Q1").natural_key(), "2025-Q1");
    }
}
