//! One repository module per table. All writes are upsert-by-natural-key;
//! all range reads come back in ascending key order.

pub mod extraction;
pub mod job_status;
pub mod monthly;
pub mod pipeline_state;
pub mod quarterly;
pub mod synthesis;
pub mod weekly;

pub use extraction::{get_extraction, get_extractions_in_range, store_extraction, StoredExtraction};
pub use job_status::{
    clear_non_terminal_jobs, get_job_by_input, get_job_status, list_dead_lettered,
    upsert_job_status, JobStatus,
};
pub use monthly::{
    get_monthly_summaries_for_quarter, get_monthly_summary, store_monthly_summary, StoredMonthly,
};
pub use pipeline_state::{
    clear_pipeline_state, get_pipeline_state, put_pipeline_state, PipelineState,
};
pub use quarterly::{
    get_all_quarterly_notepads, get_quarterly_notepad, store_quarterly_notepad, StoredQuarterly,
};
pub use synthesis::{get_synthesis, store_synthesis, StoredSynthesis};
pub use weekly::{
    get_weekly_summaries_for_month, get_weekly_summary, store_weekly_summary, StoredWeekly,
};

use super::DatabaseError;

/// Timestamp format shared by every table.
pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn now_str() -> String {
    chrono::Utc::now().format(TS_FORMAT).to_string()
}

pub(crate) fn to_body<T: serde::Serialize>(key: &str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::CorruptBody {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn from_body<T: serde::de::DeserializeOwned>(
    key: &str,
    body: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(body).map_err(|e| DatabaseError::CorruptBody {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
