//! The pipeline proper: hashing, prompts, parsing, validation, range math,
//! the work queue, the two worker bodies, and the coordinator that drives
//! them tier by tier.

pub mod aggregator;
pub mod coordinator;
pub mod extractor;
pub mod hash;
pub mod parse;
pub mod prompts;
pub mod queue;
pub mod ranges;
pub mod validate;

pub use aggregator::Aggregator;
pub use coordinator::{Coordinator, PipelineError};
pub use extractor::Extractor;
pub use queue::JobQueue;

use chrono::NaiveDate;
use rusqlite::Connection;
use thiserror::Error;

use crate::db::repository::{upsert_job_status, JobStatus};
use crate::db::DatabaseError;
use crate::llm::LlmError;
use crate::models::{JobKind, JobState, ManifestEntry, Tier};
use crate::object_store::ObjectStoreError;

/// One unit of extraction work: a single manifest entry.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub date: NaiveDate,
    pub r2_key: String,
    pub content_hash: String,
}

impl ExtractionJob {
    pub fn from_manifest_entry(entry: &ManifestEntry) -> Self {
        Self {
            date: entry.date,
            r2_key: entry.r2_key.clone(),
            content_hash: entry.content_hash.clone(),
        }
    }

    pub fn natural_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Input hash of the job: the entry's content hash under the current
    /// prompt version. Identical content + identical prompt → identical hash.
    pub fn input_hash(&self) -> String {
        hash::input_hash(
            prompts::PROMPT_VERSION,
            &[(self.natural_key(), self.content_hash.clone())],
        )
    }
}

/// One unit of aggregation work: a single artifact at a given tier.
#[derive(Debug, Clone)]
pub struct AggregationJob {
    pub tier: Tier,
    pub range_id: String,
}

impl AggregationJob {
    /// Tier-qualified natural key; range ids alone collide across tiers.
    pub fn natural_key(&self) -> String {
        format!("{}:{}", self.tier.as_str(), self.range_id)
    }
}

/// What became of one job. Workers never return Err; every failure path
/// lands in the job ledger and comes back as `DeadLettered`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded { llm_called: bool },
    /// Zero inputs existed for the range; no artifact, job still succeeds.
    Skipped,
    DeadLettered { error: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Content drift for {key}: manifest says {expected}, bytes hash to {actual}")]
    ContentDrift {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Object store error: {0}")]
    Store(#[from] ObjectStoreError),

    #[error("Database error: {0}")]
    Db(#[from] DatabaseError),
}

impl WorkerError {
    /// Permanent failures cannot succeed on a replay with the same inputs.
    /// The rest already spent their retry budgets downstream and dead-letter
    /// all the same, but a later run may clear them.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::ContentDrift { .. } | Self::SchemaValidation(_) => true,
            Self::Llm(e) => !e.is_transient(),
            Self::Store(_) | Self::Db(_) => false,
        }
    }
}

/// Record a job transition. Terminal-state monotonicity lives in the
/// repository; this only shapes the row.
pub(crate) fn transition_job(
    conn: &Connection,
    kind: JobKind,
    natural_key: &str,
    input_hash: &str,
    state: JobState,
    result_key: Option<&str>,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let mut job = JobStatus::new(kind, natural_key, input_hash);
    job.status = state;
    job.result_key = result_key.map(str::to_string);
    job.last_error = error.map(str::to_string);
    upsert_job_status(conn, &job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_job_hash_tracks_content() {
        let a = ExtractionJob {
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            r2_key: "journals/2025-03-03.md".into(),
            content_hash: "aa".into(),
        };
        let mut b = a.clone();
        assert_eq!(a.input_hash(), b.input_hash());
        b.content_hash = "bb".into();
        assert_ne!(a.input_hash(), b.input_hash());
    }

    #[test]
    fn drift_and_schema_failures_are_permanent() {
        let drift = WorkerError::ContentDrift {
            key: "journals/2025-03-04.md".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(drift.is_permanent());
        assert!(WorkerError::SchemaValidation("8 themes".into()).is_permanent());
        assert!(WorkerError::Llm(LlmError::Api {
            status: 400,
            message: "bad request".into()
        })
        .is_permanent());
    }

    #[test]
    fn infrastructure_failures_are_not_permanent() {
        assert!(!WorkerError::Store(ObjectStoreError::Network {
            key: "journals/2025-03-04.md".into(),
            reason: "connection reset".into()
        })
        .is_permanent());
        assert!(!WorkerError::Llm(LlmError::Timeout).is_permanent());
    }

    #[test]
    fn aggregation_keys_are_tier_qualified() {
        let weekly = AggregationJob {
            tier: Tier::Weekly,
            range_id: "2025-03-03".into(),
        };
        assert_eq!(weekly.natural_key(), "weekly:2025-03-03");
        let synthesis = AggregationJob {
            tier: Tier::Synthesis,
            range_id: "main".into(),
        };
        assert_eq!(synthesis.natural_key(), "synthesis:main");
    }
}
