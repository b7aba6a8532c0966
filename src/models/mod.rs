pub mod enums;
pub mod extraction;
pub mod manifest;
pub mod monthly;
pub mod quarterly;
pub mod synthesis;
pub mod weekly;

pub use enums::{JobKind, JobState, PipelinePhase, Tier, TrendLabel};
pub use extraction::{Extraction, PersonMention, SleepMention};
pub use manifest::{Manifest, ManifestEntry, ManifestError};
pub use monthly::MonthlySummary;
pub use quarterly::{PersonTrajectory, QuarterlyNotepad};
pub use synthesis::{
    MedicationCorrelation, QuarterMetric, RelationshipArc, Synthesis, TimelineMilestone,
};
pub use weekly::{PersonSeen, WeeklySummary};
