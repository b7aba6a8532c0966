//! Aggregator worker: one job per produced artifact, polymorphic over the
//! four tiers. Each tier differs only in how inputs load, which prompt is
//! built, and how the output validates; the lifecycle is shared.

use std::time::Duration;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{hash, parse, prompts, ranges, transition_job, validate, AggregationJob, JobOutcome, WorkerError};
use crate::cache::{aggregation_key, cache_get, cache_put};
use crate::db::repository::{
    get_all_quarterly_notepads, get_extractions_in_range, get_monthly_summaries_for_quarter,
    get_monthly_summary, get_quarterly_notepad, get_synthesis, get_weekly_summaries_for_month,
    get_weekly_summary, store_monthly_summary, store_quarterly_notepad, store_synthesis,
    store_weekly_summary,
};
use crate::llm::{CallOptions, ChatMessage, ChatModel};
use crate::models::{
    Extraction, JobKind, JobState, MonthlySummary, QuarterlyNotepad, Synthesis, Tier,
    WeeklySummary,
};

/// Per-tier behavior. The generic runner owns hashing, caching, status
/// transitions, and the retry-once contract.
trait TierSpec {
    type Input: Serialize;
    type Artifact: Serialize + DeserializeOwned;

    fn load(conn: &Connection, range_id: &str) -> Result<Vec<Self::Input>, WorkerError>;
    fn input_key(input: &Self::Input) -> String;
    fn system_prompt() -> &'static str;
    fn user_prompt(range_id: &str, inputs: &[Self::Input]) -> String;
    fn validate(artifact: &Self::Artifact, range_id: &str, n_inputs: usize) -> Result<(), String>;
    /// Input hash of the already-persisted artifact for this range, if any.
    fn stored_hash(conn: &Connection, range_id: &str) -> Result<Option<String>, WorkerError>;
    fn store(
        conn: &Connection,
        artifact: &Self::Artifact,
        input_hash: &str,
    ) -> Result<(), WorkerError>;
}

pub struct Aggregator<'a> {
    pub llm: &'a dyn ChatModel,
    pub cache_ttl: Duration,
}

impl<'a> Aggregator<'a> {
    /// Run one aggregation job to a terminal job state.
    pub fn process(&self, conn: &Connection, job: &AggregationJob) -> JobOutcome {
        let result = match job.tier {
            Tier::Weekly => self.run_tier::<WeeklySpec>(conn, job),
            Tier::Monthly => self.run_tier::<MonthlySpec>(conn, job),
            Tier::Quarterly => self.run_tier::<QuarterlySpec>(conn, job),
            Tier::Synthesis => self.run_tier::<SynthesisSpec>(conn, job),
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let natural_key = job.natural_key();
                let permanent = e.is_permanent();
                let message = e.to_string();
                tracing::warn!(
                    job = %natural_key,
                    permanent,
                    error = %message,
                    "Aggregation dead-lettered"
                );
                if let Err(db_err) = transition_job(
                    conn,
                    JobKind::Aggregation,
                    &natural_key,
                    "",
                    JobState::DeadLettered,
                    None,
                    Some(&message),
                ) {
                    tracing::error!(job = %natural_key, error = %db_err, "Failed to record dead-letter");
                }
                JobOutcome::DeadLettered { error: message }
            }
        }
    }

    fn run_tier<S: TierSpec>(
        &self,
        conn: &Connection,
        job: &AggregationJob,
    ) -> Result<JobOutcome, WorkerError> {
        let natural_key = job.natural_key();

        let inputs = S::load(conn, &job.range_id)?;
        if inputs.is_empty() {
            tracing::info!(job = %natural_key, "No inputs exist for range, nothing to aggregate");
            transition_job(
                conn,
                JobKind::Aggregation,
                &natural_key,
                "",
                JobState::Succeeded,
                None,
                None,
            )?;
            return Ok(JobOutcome::Skipped);
        }

        let pairs: Vec<(String, String)> = inputs
            .iter()
            .map(|input| {
                let body = serde_json::to_string(input)
                    .map_err(|e| WorkerError::SchemaValidation(e.to_string()))?;
                Ok((S::input_key(input), hash::sha256_hex(body.as_bytes())))
            })
            .collect::<Result<_, WorkerError>>()?;
        let input_hash = hash::input_hash(prompts::PROMPT_VERSION, &pairs);

        // Replay short-circuit against the persisted artifact.
        if let Some(stored_hash) = S::stored_hash(conn, &job.range_id)? {
            if stored_hash == input_hash {
                tracing::debug!(job = %natural_key, "Artifact already persisted, skipping");
                transition_job(
                    conn,
                    JobKind::Aggregation,
                    &natural_key,
                    &input_hash,
                    JobState::Succeeded,
                    Some(&job.range_id),
                    None,
                )?;
                return Ok(JobOutcome::Succeeded { llm_called: false });
            }
        }

        transition_job(
            conn,
            JobKind::Aggregation,
            &natural_key,
            &input_hash,
            JobState::Running,
            None,
            None,
        )?;

        let cache_key = aggregation_key(job.tier, &job.range_id, &input_hash);
        if let Some(body) = cache_get(conn, &cache_key)? {
            match parse::parse_payload::<S::Artifact>(&body)
                .and_then(|a| S::validate(&a, &job.range_id, inputs.len()).map(|_| a))
            {
                Ok(artifact) => {
                    S::store(conn, &artifact, &input_hash)?;
                    transition_job(
                        conn,
                        JobKind::Aggregation,
                        &natural_key,
                        &input_hash,
                        JobState::Succeeded,
                        Some(&job.range_id),
                        None,
                    )?;
                    tracing::debug!(job = %natural_key, "Artifact restored from cache");
                    return Ok(JobOutcome::Succeeded { llm_called: false });
                }
                Err(e) => {
                    tracing::debug!(job = %natural_key, error = %e, "Cached body invalid, ignoring");
                }
            }
        }

        let messages = vec![
            ChatMessage::system(S::system_prompt()),
            ChatMessage::user(S::user_prompt(&job.range_id, &inputs)),
        ];
        let options = CallOptions::default();

        let artifact = self.call_and_validate::<S>(&messages, &options, job, inputs.len())?;
        let body = serde_json::to_string(&artifact)
            .map_err(|e| WorkerError::SchemaValidation(e.to_string()))?;

        S::store(conn, &artifact, &input_hash)?;
        cache_put(conn, &cache_key, &body, self.cache_ttl)?;
        transition_job(
            conn,
            JobKind::Aggregation,
            &natural_key,
            &input_hash,
            JobState::Succeeded,
            Some(&job.range_id),
            None,
        )?;
        Ok(JobOutcome::Succeeded { llm_called: true })
    }

    /// One call, one retry with the identical prompt on schema failure.
    fn call_and_validate<S: TierSpec>(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
        job: &AggregationJob,
        n_inputs: usize,
    ) -> Result<S::Artifact, WorkerError> {
        let mut last_error = String::new();
        for attempt in 0..2 {
            let response = self.llm.complete(messages, options)?;
            match parse::parse_payload::<S::Artifact>(&response)
                .and_then(|a| S::validate(&a, &job.range_id, n_inputs).map(|_| a))
            {
                Ok(artifact) => return Ok(artifact),
                Err(e) => {
                    tracing::warn!(
                        job = %job.natural_key(),
                        attempt,
                        error = %e,
                        "Aggregation response failed validation"
                    );
                    last_error = e;
                }
            }
        }
        Err(WorkerError::SchemaValidation(last_error))
    }
}

// ───────────────────────────────────────────────
// Tier specs
// ───────────────────────────────────────────────

struct WeeklySpec;

impl TierSpec for WeeklySpec {
    type Input = Extraction;
    type Artifact = WeeklySummary;

    fn load(conn: &Connection, range_id: &str) -> Result<Vec<Extraction>, WorkerError> {
        let week_start = parse_week_range(range_id)?;
        let week_end = week_start + chrono::Days::new(6);
        Ok(get_extractions_in_range(conn, week_start, week_end)?)
    }

    fn input_key(input: &Extraction) -> String {
        input.natural_key()
    }

    fn system_prompt() -> &'static str {
        prompts::weekly_system_prompt()
    }

    fn user_prompt(range_id: &str, inputs: &[Extraction]) -> String {
        match ranges::parse_week_start(range_id) {
            Some(week_start) => prompts::weekly_prompt(week_start, inputs),
            None => String::new(),
        }
    }

    fn validate(artifact: &WeeklySummary, range_id: &str, _n: usize) -> Result<(), String> {
        let week_start = ranges::parse_week_start(range_id)
            .ok_or_else(|| format!("malformed weekly range id {range_id}"))?;
        validate::validate_weekly(artifact, week_start)
    }

    fn stored_hash(conn: &Connection, range_id: &str) -> Result<Option<String>, WorkerError> {
        let week_start = parse_week_range(range_id)?;
        Ok(get_weekly_summary(conn, week_start)?.map(|s| s.input_hash))
    }

    fn store(
        conn: &Connection,
        artifact: &WeeklySummary,
        input_hash: &str,
    ) -> Result<(), WorkerError> {
        Ok(store_weekly_summary(conn, artifact, input_hash)?)
    }
}

fn parse_week_range(range_id: &str) -> Result<chrono::NaiveDate, WorkerError> {
    ranges::parse_week_start(range_id)
        .ok_or_else(|| WorkerError::SchemaValidation(format!("malformed weekly range id {range_id}")))
}

struct MonthlySpec;

impl TierSpec for MonthlySpec {
    type Input = WeeklySummary;
    type Artifact = MonthlySummary;

    fn load(conn: &Connection, range_id: &str) -> Result<Vec<WeeklySummary>, WorkerError> {
        Ok(get_weekly_summaries_for_month(conn, range_id)?)
    }

    fn input_key(input: &WeeklySummary) -> String {
        input.natural_key()
    }

    fn system_prompt() -> &'static str {
        prompts::monthly_system_prompt()
    }

    fn user_prompt(range_id: &str, inputs: &[WeeklySummary]) -> String {
        prompts::monthly_prompt(range_id, inputs)
    }

    fn validate(artifact: &MonthlySummary, range_id: &str, _n: usize) -> Result<(), String> {
        validate::validate_monthly(artifact, range_id)
    }

    fn stored_hash(conn: &Connection, range_id: &str) -> Result<Option<String>, WorkerError> {
        Ok(get_monthly_summary(conn, range_id)?.map(|s| s.input_hash))
    }

    fn store(
        conn: &Connection,
        artifact: &MonthlySummary,
        input_hash: &str,
    ) -> Result<(), WorkerError> {
        Ok(store_monthly_summary(conn, artifact, input_hash)?)
    }
}

struct QuarterlySpec;

impl TierSpec for QuarterlySpec {
    type Input = MonthlySummary;
    type Artifact = QuarterlyNotepad;

    fn load(conn: &Connection, range_id: &str) -> Result<Vec<MonthlySummary>, WorkerError> {
        Ok(get_monthly_summaries_for_quarter(conn, range_id)?)
    }

    fn input_key(input: &MonthlySummary) -> String {
        input.natural_key()
    }

    fn system_prompt() -> &'static str {
        prompts::quarterly_system_prompt()
    }

    fn user_prompt(range_id: &str, inputs: &[MonthlySummary]) -> String {
        prompts::quarterly_prompt(range_id, inputs)
    }

    fn validate(artifact: &QuarterlyNotepad, range_id: &str, n: usize) -> Result<(), String> {
        validate::validate_quarterly(artifact, range_id, n)
    }

    fn stored_hash(conn: &Connection, range_id: &str) -> Result<Option<String>, WorkerError> {
        Ok(get_quarterly_notepad(conn, range_id)?.map(|s| s.input_hash))
    }

    fn store(
        conn: &Connection,
        artifact: &QuarterlyNotepad,
        input_hash: &str,
    ) -> Result<(), WorkerError> {
        Ok(store_quarterly_notepad(conn, artifact, input_hash)?)
    }
}

struct SynthesisSpec;

impl TierSpec for SynthesisSpec {
    type Input = QuarterlyNotepad;
    type Artifact = Synthesis;

    fn load(conn: &Connection, _range_id: &str) -> Result<Vec<QuarterlyNotepad>, WorkerError> {
        Ok(get_all_quarterly_notepads(conn)?)
    }

    fn input_key(input: &QuarterlyNotepad) -> String {
        input.natural_key()
    }

    fn system_prompt() -> &'static str {
        prompts::synthesis_system_prompt()
    }

    fn user_prompt(_range_id: &str, inputs: &[QuarterlyNotepad]) -> String {
        prompts::synthesis_prompt(inputs)
    }

    fn validate(artifact: &Synthesis, _range_id: &str, n: usize) -> Result<(), String> {
        validate::validate_synthesis(artifact, n)
    }

    fn stored_hash(conn: &Connection, _range_id: &str) -> Result<Option<String>, WorkerError> {
        Ok(get_synthesis(conn)?.map(|s| s.input_hash))
    }

    fn store(
        conn: &Connection,
        artifact: &Synthesis,
        input_hash: &str,
    ) -> Result<(), WorkerError> {
        Ok(store_synthesis(conn, artifact, input_hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::db::repository::{get_job_status, store_extraction, JobStatus};
    use crate::db::sqlite::open_memory_database;
    use crate::models::extraction::tests::sample as extraction_sample;
    use crate::models::weekly::tests::sample as weekly_sample;
    use crate::pipeline::extractor::tests::ScriptedModel;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn weekly_job() -> AggregationJob {
        AggregationJob {
            tier: Tier::Weekly,
            range_id: "2025-03-03".into(),
        }
    }

    fn good_weekly_response() -> String {
        serde_json::to_string(&weekly_sample(d(2025, 3, 3))).unwrap()
    }

    fn seed_extractions(conn: &Connection, days: &[u32]) {
        for day in days {
            let e = extraction_sample(d(2025, 3, *day));
            store_extraction(conn, &e, "content-hash").unwrap();
        }
    }

    #[test]
    fn weekly_aggregation_persists_and_succeeds() {
        let conn = open_memory_database().unwrap();
        seed_extractions(&conn, &[3, 4, 5]);
        let model = ScriptedModel::new(vec![Ok(good_weekly_response())]);
        let aggregator = Aggregator {
            llm: &model,
            cache_ttl: Duration::from_secs(600),
        };

        let outcome = aggregator.process(&conn, &weekly_job());
        assert_eq!(outcome, JobOutcome::Succeeded { llm_called: true });
        assert_eq!(model.call_count(), 1);

        let stored = get_weekly_summary(&conn, d(2025, 3, 3)).unwrap().unwrap();
        assert_eq!(stored.summary.week_start, d(2025, 3, 3));

        let status = get_job_status(
            &conn,
            &JobStatus::id_for(JobKind::Aggregation, "weekly:2025-03-03"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(status.status, JobState::Succeeded);
        assert_eq!(status.result_key.as_deref(), Some("2025-03-03"));
    }

    #[test]
    fn empty_range_skips_without_failing() {
        let conn = open_memory_database().unwrap();
        let model = ScriptedModel::new(vec![]);
        let aggregator = Aggregator {
            llm: &model,
            cache_ttl: Duration::from_secs(600),
        };

        let outcome = aggregator.process(&conn, &weekly_job());
        assert_eq!(outcome, JobOutcome::Skipped);
        assert_eq!(model.call_count(), 0);
        assert!(get_weekly_summary(&conn, d(2025, 3, 3)).unwrap().is_none());

        let status = get_job_status(
            &conn,
            &JobStatus::id_for(JobKind::Aggregation, "weekly:2025-03-03"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(status.status, JobState::Succeeded);
    }

    #[test]
    fn replay_with_identical_inputs_skips_the_model() {
        let conn = open_memory_database().unwrap();
        seed_extractions(&conn, &[3, 4, 5]);
        let model = ScriptedModel::new(vec![Ok(good_weekly_response())]);
        let aggregator = Aggregator {
            llm: &model,
            cache_ttl: Duration::from_secs(600),
        };

        aggregator.process(&conn, &weekly_job());
        let outcome = aggregator.process(&conn, &weekly_job());
        assert_eq!(outcome, JobOutcome::Succeeded { llm_called: false });
        assert_eq!(model.call_count(), 1);
    }

    #[test]
    fn changed_inputs_invalidate_the_replay() {
        let conn = open_memory_database().unwrap();
        seed_extractions(&conn, &[3, 4]);
        let model = ScriptedModel::new(vec![Ok(good_weekly_response()), Ok(good_weekly_response())]);
        let aggregator = Aggregator {
            llm: &model,
            cache_ttl: Duration::from_secs(600),
        };

        aggregator.process(&conn, &weekly_job());
        // A late extraction lands inside the same window.
        seed_extractions(&conn, &[5]);
        let outcome = aggregator.process(&conn, &weekly_job());
        assert_eq!(outcome, JobOutcome::Succeeded { llm_called: true });
        assert_eq!(model.call_count(), 2);
    }

    #[test]
    fn schema_violation_retries_once_then_dead_letters() {
        let conn = open_memory_database().unwrap();
        seed_extractions(&conn, &[3]);
        // week_start echoed wrong on both attempts.
        let wrong = serde_json::to_string(&weekly_sample(d(2025, 3, 10))).unwrap();
        let model = ScriptedModel::new(vec![Ok(wrong.clone()), Ok(wrong)]);
        let aggregator = Aggregator {
            llm: &model,
            cache_ttl: Duration::from_secs(600),
        };

        let outcome = aggregator.process(&conn, &weekly_job());
        assert!(matches!(outcome, JobOutcome::DeadLettered { .. }));
        assert_eq!(model.call_count(), 2);

        let status = get_job_status(
            &conn,
            &JobStatus::id_for(JobKind::Aggregation, "weekly:2025-03-03"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(status.status, JobState::DeadLettered);
    }

    #[test]
    fn synthesis_runs_over_available_notepads() {
        let conn = open_memory_database().unwrap();
        let notepad = crate::models::quarterly::tests::sample("2025-Q1");
        store_quarterly_notepad(&conn, &notepad, "ih").unwrap();

        let synthesis = crate::models::synthesis::tests::sample();
        let model = ScriptedModel::new(vec![Ok(serde_json::to_string(&synthesis).unwrap())]);
        let aggregator = Aggregator {
            llm: &model,
            cache_ttl: Duration::from_secs(600),
        };

        let job = AggregationJob {
            tier: Tier::Synthesis,
            range_id: "main".into(),
        };
        let outcome = aggregator.process(&conn, &job);
        assert_eq!(outcome, JobOutcome::Succeeded { llm_called: true });
        assert!(get_synthesis(&conn).unwrap().is_some());
    }
}
