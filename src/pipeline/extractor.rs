//! Extractor worker: one job in, one persisted extraction out.
//!
//! Order of cheapness: persisted artifact, then cache, then the model. The
//! LLM is only called when neither store knows this exact content under the
//! current prompt version.

use std::time::Duration;

use rusqlite::Connection;

use super::{hash, parse, prompts, transition_job, validate, ExtractionJob, JobOutcome, WorkerError};
use crate::cache::{cache_get, cache_put, extraction_key};
use crate::db::repository::{get_extraction, store_extraction};
use crate::llm::{CallOptions, ChatMessage, ChatModel};
use crate::models::{Extraction, JobKind, JobState};
use crate::object_store::ObjectStore;

pub struct Extractor<'a> {
    pub store: &'a dyn ObjectStore,
    pub llm: &'a dyn ChatModel,
    pub cache_ttl: Duration,
}

impl<'a> Extractor<'a> {
    /// Run one extraction job to a terminal job state. Never panics on a
    /// failed job; the failure is recorded and reported in the outcome.
    pub fn process(&self, conn: &Connection, job: &ExtractionJob) -> JobOutcome {
        let natural_key = job.natural_key();
        let input_hash = job.input_hash();

        match self.run(conn, job, &input_hash) {
            Ok(llm_called) => {
                if let Err(e) = transition_job(
                    conn,
                    JobKind::Extraction,
                    &natural_key,
                    &input_hash,
                    JobState::Succeeded,
                    Some(&natural_key),
                    None,
                ) {
                    tracing::error!(job = %natural_key, error = %e, "Failed to record success");
                }
                JobOutcome::Succeeded { llm_called }
            }
            Err(e) => {
                let permanent = e.is_permanent();
                let message = e.to_string();
                tracing::warn!(
                    job = %natural_key,
                    permanent,
                    error = %message,
                    "Extraction dead-lettered"
                );
                if let Err(db_err) = transition_job(
                    conn,
                    JobKind::Extraction,
                    &natural_key,
                    &input_hash,
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

    /// Ok(true) when the model was called, Ok(false) on a replay hit.
    fn run(
        &self,
        conn: &Connection,
        job: &ExtractionJob,
        input_hash: &str,
    ) -> Result<bool, WorkerError> {
        let natural_key = job.natural_key();

        // Replay short-circuit: the artifact already exists for this exact
        // content and prompt version.
        if let Some(stored) = get_extraction(conn, job.date)? {
            if stored.input_hash == input_hash {
                tracing::debug!(job = %natural_key, "Extraction already persisted, skipping");
                return Ok(false);
            }
        }

        transition_job(
            conn,
            JobKind::Extraction,
            &natural_key,
            input_hash,
            JobState::Running,
            None,
            None,
        )?;

        let cache_key = extraction_key(job.date, &job.content_hash);
        if let Some(body) = cache_get(conn, &cache_key)? {
            match parse::parse_payload::<Extraction>(&body)
                .map_err(WorkerError::SchemaValidation)
                .and_then(|e| {
                    validate::validate_extraction(&e, job.date)
                        .map_err(WorkerError::SchemaValidation)?;
                    Ok(e)
                }) {
                Ok(extraction) => {
                    store_extraction(conn, &extraction, input_hash)?;
                    tracing::debug!(job = %natural_key, "Extraction restored from cache");
                    return Ok(false);
                }
                Err(e) => {
                    // Stale cache from an older schema; fall through to the model.
                    tracing::debug!(job = %natural_key, error = %e, "Cached body invalid, ignoring");
                }
            }
        }

        let bytes = self.store.get(&job.r2_key)?;
        let actual_hash = hash::sha256_hex(&bytes);
        if actual_hash != job.content_hash {
            return Err(WorkerError::ContentDrift {
                key: job.r2_key.clone(),
                expected: job.content_hash.clone(),
                actual: actual_hash,
            });
        }
        let content = String::from_utf8_lossy(&bytes);

        let messages = vec![
            ChatMessage::system(prompts::extraction_system_prompt()),
            ChatMessage::user(prompts::extraction_prompt(job.date, &content)),
        ];
        let options = CallOptions::default();

        let extraction = self.call_and_validate(&messages, &options, job)?;
        let body = serde_json::to_string(&extraction)
            .map_err(|e| WorkerError::SchemaValidation(e.to_string()))?;

        cache_put(conn, &cache_key, &body, self.cache_ttl)?;
        store_extraction(conn, &extraction, input_hash)?;
        Ok(true)
    }

    /// One call, one retry with the identical prompt on schema failure.
    fn call_and_validate(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
        job: &ExtractionJob,
    ) -> Result<Extraction, WorkerError> {
        let mut last_error = String::new();
        for attempt in 0..2 {
            let response = self.llm.complete(messages, options)?;
            match parse::parse_payload::<Extraction>(&response)
                .and_then(|e| validate::validate_extraction(&e, job.date).map(|_| e))
            {
                Ok(extraction) => return Ok(extraction),
                Err(e) => {
                    tracing::warn!(
                        job = %job.natural_key(),
                        attempt,
                        error = %e,
                        "Extraction response failed validation"
                    );
                    last_error = e;
                }
            }
        }
        Err(WorkerError::SchemaValidation(last_error))
    }
}
