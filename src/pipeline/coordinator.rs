//! Coordinator: the singleton state machine owning tier progression.
//!
//! idle → extracting → aggregating(weekly → monthly → quarterly → synthesis)
//! → complete, with `reset` back to idle from anywhere. All coordination
//! state lives in the pipeline_state row; the coordinator is its only
//! writer. Tier completion is detected by comparing the expected range-id
//! set against persisted artifacts plus terminal job rows — never by
//! counting acknowledgements.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

use super::{
    ranges, transition_job, AggregationJob, Aggregator, ExtractionJob, Extractor, JobOutcome,
    JobQueue,
};
use crate::db::repository::{
    clear_non_terminal_jobs, clear_pipeline_state, get_all_quarterly_notepads, get_extraction,
    get_job_by_input, get_job_status, get_monthly_summary, get_pipeline_state,
    get_quarterly_notepad, get_synthesis, get_weekly_summary, list_dead_lettered,
    put_pipeline_state, JobStatus, PipelineState,
};
use crate::db::sqlite::open_database;
use crate::db::DatabaseError;
use crate::llm::ChatModel;
use crate::models::synthesis::SYNTHESIS_KEY;
use crate::models::{JobKind, JobState, Manifest, ManifestError, PipelinePhase, Tier};
use crate::object_store::{ObjectStore, ObjectStoreError, MANIFEST_KEY};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid transition: {operation} while phase is {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: PipelinePhase,
    },

    #[error("Manifest invalid: {0}")]
    ManifestInvalid(#[from] ManifestError),

    #[error("Manifest unreadable: {0}")]
    ManifestUnreadable(#[from] ObjectStoreError),

    #[error("Database error: {0}")]
    Db(#[from] DatabaseError),
}

pub struct Coordinator {
    db_path: PathBuf,
    store: Arc<dyn ObjectStore>,
    llm: Arc<dyn ChatModel>,
    parallelism: usize,
    cache_ttl: Duration,
}

impl Coordinator {
    pub fn new(
        db_path: impl Into<PathBuf>,
        store: Arc<dyn ObjectStore>,
        llm: Arc<dyn ChatModel>,
        parallelism: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            store,
            llm,
            parallelism: parallelism.max(1),
            cache_ttl,
        }
    }

    /// Run the whole pipeline to completion: read the manifest, extract
    /// every entry, then advance tier by tier until the synthesis lands.
    ///
    /// Errors if the pipeline is not idle or the manifest cannot be read;
    /// in both cases no state is mutated.
    pub fn start(&self) -> Result<PipelineState, PipelineError> {
        let conn = open_database(&self.db_path)?;
        let current = get_pipeline_state(&conn)?;
        if current.phase != PipelinePhase::Idle {
            return Err(PipelineError::InvalidTransition {
                operation: "start",
                phase: current.phase,
            });
        }

        let bytes = self.store.get(MANIFEST_KEY)?;
        let manifest = Manifest::parse(&bytes)?;

        let mut state = PipelineState {
            phase: PipelinePhase::Extracting,
            total_entries: manifest.entries.len() as u32,
            processed_entries: 0,
            current_tier: None,
            warnings: Vec::new(),
            started_at: Some(chrono::Utc::now().naive_utc()),
            completed_at: None,
        };
        put_pipeline_state(&conn, &state)?;
        tracing::info!(
            total_entries = manifest.entries.len(),
            from = %manifest.first_date(),
            to = %manifest.last_date(),
            "Pipeline started"
        );

        self.run_extraction_phase(&conn, &mut state, &manifest)?;

        let week_starts = ranges::week_windows(manifest.first_date(), manifest.last_date());
        let months = ranges::months_for_weeks(&week_starts);
        let quarters = ranges::quarters_for_months(&months);

        state.phase = PipelinePhase::Aggregating;
        for tier in Tier::all() {
            let range_ids: Vec<String> = match tier {
                Tier::Weekly => week_starts
                    .iter()
                    .map(|ws| ws.format("%Y-%m-%d").to_string())
                    .collect(),
                Tier::Monthly => months.clone(),
                Tier::Quarterly => quarters.clone(),
                Tier::Synthesis => vec![SYNTHESIS_KEY.to_string()],
            };

            if *tier == Tier::Synthesis && !self.synthesis_viable(&conn, &mut state)? {
                continue;
            }

            state.current_tier = Some(*tier);
            put_pipeline_state(&conn, &state)?;
            tracing::info!(tier = tier.as_str(), jobs = range_ids.len(), "Tier starting");

            self.run_aggregation_tier(&conn, &mut state, *tier, &range_ids)?;

            let missing = self.unfinished_ranges(&conn, *tier, &range_ids)?;
            if !missing.is_empty() {
                let warning = format!(
                    "tier {} finished with unresolved ranges: {}",
                    tier.as_str(),
                    missing.join(", ")
                );
                tracing::warn!(tier = tier.as_str(), ?missing, "Tier left unresolved ranges");
                state.warnings.push(warning);
                put_pipeline_state(&conn, &state)?;
            }
        }

        state.phase = PipelinePhase::Complete;
        state.current_tier = None;
        state.completed_at = Some(chrono::Utc::now().naive_utc());
        put_pipeline_state(&conn, &state)?;
        tracing::info!(warnings = state.warnings.len(), "Pipeline complete");
        Ok(state)
    }

    /// Current pipeline state plus a warning line per dead-lettered job.
    pub fn status(&self) -> Result<PipelineState, PipelineError> {
        let conn = open_database(&self.db_path)?;
        let mut state = get_pipeline_state(&conn)?;
        for job in list_dead_lettered(&conn)? {
            let warning = dead_letter_warning(
                job.job_type,
                &job.natural_key,
                job.last_error.as_deref().unwrap_or("unknown error"),
            );
            if !state.warnings.contains(&warning) {
                state.warnings.push(warning);
            }
        }
        Ok(state)
    }

    /// Back to idle. Pipeline state and in-flight job rows are cleared;
    /// artifacts and terminal job rows are preserved so a re-run replays
    /// from persistence instead of the provider.
    pub fn reset(&self) -> Result<(), PipelineError> {
        let conn = open_database(&self.db_path)?;
        clear_pipeline_state(&conn)?;
        let cleared = clear_non_terminal_jobs(&conn)?;
        tracing::info!(cleared_jobs = cleared, "Pipeline reset to idle; artifacts preserved");
        Ok(())
    }

    // ───────────────────────────────────────────────
    // Phase runners
    // ───────────────────────────────────────────────

    fn run_extraction_phase(
        &self,
        conn: &Connection,
        state: &mut PipelineState,
        manifest: &Manifest,
    ) -> Result<(), PipelineError> {
        let queue = JobQueue::new();
        for entry in &manifest.entries {
            let job = ExtractionJob::from_manifest_entry(entry);
            let input_hash = job.input_hash();

            // Dispatching a job whose (type, input-hash) already succeeded
            // is a no-op, provided its artifact survived.
            if get_job_by_input(conn, JobKind::Extraction, &input_hash)?.is_some()
                && get_extraction(conn, job.date)?.is_some()
            {
                tracing::debug!(job = %job.natural_key(), "Dispatch no-op: inputs already succeeded");
                state.processed_entries += 1;
                continue;
            }

            transition_job(
                conn,
                JobKind::Extraction,
                &job.natural_key(),
                &input_hash,
                JobState::Pending,
                None,
                None,
            )?;
            queue.push(job);
        }
        queue.close();
        put_pipeline_state(conn, state)?;

        let (tx, rx) = mpsc::channel::<(String, JobOutcome)>();
        std::thread::scope(|scope| -> Result<(), PipelineError> {
            for _ in 0..self.parallelism {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    let worker_conn = match open_database(&self.db_path) {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::error!(error = %e, "Extraction worker could not open database");
                            return;
                        }
                    };
                    let extractor = Extractor {
                        store: self.store.as_ref(),
                        llm: self.llm.as_ref(),
                        cache_ttl: self.cache_ttl,
                    };
                    while let Some(job) = queue.pop() {
                        let key = job.natural_key();
                        let outcome = extractor.process(&worker_conn, &job);
                        if tx.send((key, outcome)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(tx);

            for (key, outcome) in rx {
                match outcome {
                    JobOutcome::Succeeded { .. } | JobOutcome::Skipped => {
                        state.processed_entries += 1;
                    }
                    JobOutcome::DeadLettered { error } => {
                        state
                            .warnings
                            .push(dead_letter_warning(JobKind::Extraction, &key, &error));
                    }
                }
                put_pipeline_state(conn, state)?;
            }
            Ok(())
        })?;

        tracing::info!(
            processed = state.processed_entries,
            total = state.total_entries,
            "Extraction phase finished"
        );
        Ok(())
    }

    fn run_aggregation_tier(
        &self,
        conn: &Connection,
        state: &mut PipelineState,
        tier: Tier,
        range_ids: &[String],
    ) -> Result<(), PipelineError> {
        let queue = JobQueue::new();
        for range_id in range_ids {
            queue.push(AggregationJob {
                tier,
                range_id: range_id.clone(),
            });
        }
        queue.close();

        let (tx, rx) = mpsc::channel::<(String, JobOutcome)>();
        std::thread::scope(|scope| -> Result<(), PipelineError> {
            for _ in 0..self.parallelism {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    let worker_conn = match open_database(&self.db_path) {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::error!(error = %e, "Aggregation worker could not open database");
                            return;
                        }
                    };
                    let aggregator = Aggregator {
                        llm: self.llm.as_ref(),
                        cache_ttl: self.cache_ttl,
                    };
                    while let Some(job) = queue.pop() {
                        let key = job.natural_key();
                        let outcome = aggregator.process(&worker_conn, &job);
                        if tx.send((key, outcome)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(tx);

            for (key, outcome) in rx {
                if let JobOutcome::DeadLettered { error } = outcome {
                    state
                        .warnings
                        .push(dead_letter_warning(JobKind::Aggregation, &key, &error));
                    put_pipeline_state(conn, state)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    // ───────────────────────────────────────────────
    // Completion detection
    // ───────────────────────────────────────────────

    /// Range ids with neither a persisted artifact nor a terminal job row.
    fn unfinished_ranges(
        &self,
        conn: &Connection,
        tier: Tier,
        range_ids: &[String],
    ) -> Result<Vec<String>, PipelineError> {
        let mut missing = Vec::new();
        for range_id in range_ids {
            if artifact_exists(conn, tier, range_id)? {
                continue;
            }
            let job = AggregationJob {
                tier,
                range_id: range_id.clone(),
            };
            let id = JobStatus::id_for(JobKind::Aggregation, &job.natural_key());
            let terminal = get_job_status(conn, &id)?
                .map(|j| j.status.is_terminal())
                .unwrap_or(false);
            if !terminal {
                missing.push(range_id.clone());
            }
        }
        Ok(missing)
    }

    /// Synthesis gate: with zero notepads the tier is skipped outright; with
    /// fewer than the full two-year set it runs over what exists, warned.
    fn synthesis_viable(
        &self,
        conn: &Connection,
        state: &mut PipelineState,
    ) -> Result<bool, PipelineError> {
        let notepads = get_all_quarterly_notepads(conn)?;
        if notepads.is_empty() {
            state
                .warnings
                .push("no quarterly notepads exist; synthesis skipped".into());
            put_pipeline_state(conn, state)?;
            tracing::warn!("Synthesis skipped: no quarterly notepads");
            return Ok(false);
        }
        if notepads.len() != 8 {
            let warning = format!(
                "synthesis running over {} quarterly notepads (expected 8)",
                notepads.len()
            );
            tracing::warn!(notepads = notepads.len(), "Synthesis over a partial span");
            state.warnings.push(warning);
            put_pipeline_state(conn, state)?;
        }
        Ok(true)
    }
}

fn dead_letter_warning(kind: JobKind, natural_key: &str, error: &str) -> String {
    format!("{} {} dead-lettered: {}", kind.as_str(), natural_key, error)
}

fn artifact_exists(conn: &Connection, tier: Tier, range_id: &str) -> Result<bool, DatabaseError> {
    match tier {
        Tier::Weekly => match ranges::parse_week_start(range_id) {
            Some(week_start) => Ok(get_weekly_summary(conn, week_start)?.is_some()),
            None => Ok(false),
        },
        Tier::Monthly => Ok(get_monthly_summary(conn, range_id)?.is_some()),
        Tier::Quarterly => Ok(get_quarterly_notepad(conn, range_id)?.is_some()),
        Tier::Synthesis => Ok(get_synthesis(conn)?.is_some()),
    }
}
