use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One person mentioned in an entry: who, how they relate, how the
/// interaction read, and over what channel it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonMention {
    pub name: String,
    /// Relationship kind: "partner", "friend", "family", "coworker", ...
    pub relationship: String,
    /// Sentiment of the interaction, -1.0 (hostile) to 1.0 (warm).
    pub sentiment: f32,
    /// Interaction mode: "in_person", "call", "text", "mentioned_only".
    pub interaction: String,
}

/// Sleep signal from an entry. `quality` is only meaningful when the entry
/// actually talks about sleep; null otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepMention {
    pub mentioned: bool,
    /// 1-10 when mentioned and gradable, else null.
    pub quality: Option<u8>,
}

/// Tier-0 artifact: the dense structured record extracted from one raw
/// journal entry. Keyed by entry date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub date: NaiveDate,
    /// 1-10.
    pub mood_score: u8,
    /// 1-10.
    pub energy_level: u8,
    pub sleep: SleepMention,
    pub medication_mentions: Vec<String>,
    pub hormone_mentions: Vec<String>,
    pub people: Vec<PersonMention>,
    pub activities: Vec<String>,
    pub events: Vec<String>,
    /// At most 5.
    pub dominant_themes: Vec<String>,
    pub identity_markers: Vec<String>,
    /// At most 3, verbatim from the entry.
    pub key_quotes: Vec<String>,
    /// 2-3 sentence summary.
    pub summary: String,
}

impl Extraction {
    /// Natural key of this artifact: the ISO entry date.
    pub fn natural_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}
