// Background mock draft jobs.
//
// A job is generated in short batches. Each batch takes the job's lease,
// resumes from the saved pick index, and persists its picks before
// releasing the lease. The final batch publishes the draft.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::draft::pick::PickRecord;
use crate::league::LeagueProvider;
use crate::mock::article::{to_markdown_article, PublishRequest};
use crate::mock::generator::{DecisionStep, GeneratorOptions, MockDraftGenerator};
use crate::pipeline::{load_league_context, mock_order};
use crate::pool::load_pool;
use crate::protocol::{ProgressUpdate, StopReason, TraceEvent};

pub const DEFAULT_BATCH_PICKS: usize = 4;
pub const DEFAULT_BATCH_TIME_BUDGET: Duration = Duration::from_secs(60);
pub const DEFAULT_LEASE: Duration = Duration::from_secs(45);
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 300;
pub const DEFAULT_LOG_TTL: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// Job records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// What to generate. Fixed at job creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub title: String,
    pub description: String,
    pub rounds: u32,
    pub max_picks: usize,
    pub trace: bool,
    pub model: String,
    /// Seeds the draft order coin flip and style jitter. When absent the job
    /// id is used so every batch of a job sees the same order.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub message: String,
    pub current_pick_number: Option<String>,
    pub generated_picks: usize,
    pub total_picks: usize,
    pub heartbeat_at: Option<String>,
}

impl JobProgress {
    pub fn queued(total_picks: usize) -> Self {
        Self {
            message: "Queued…".to_string(),
            current_pick_number: None,
            generated_picks: 0,
            total_picks,
            heartbeat_at: Some(Utc::now().to_rfc3339()),
        }
    }
}

/// Partial (then final) output of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Id of the published mock draft once the job is done.
    #[serde(default)]
    pub draft_id: Option<i64>,
    #[serde(default)]
    pub picks: Vec<PickRecord>,
    #[serde(default)]
    pub article: String,
    #[serde(default)]
    pub trace: Vec<TraceEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: i64,
    pub status: JobStatus,
    pub created_by: Option<String>,
    pub config: JobConfig,
    /// 0-based index into the draft order of the next pick to generate.
    pub next_pick_index: usize,
    pub progress: JobProgress,
    pub result: JobResult,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Live logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    Running,
    Pick,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveLogEntry {
    pub at: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
    pub pick_number: Option<String>,
}

impl LiveLogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            kind,
            message: message.into(),
            pick_number: None,
        }
    }

    pub fn with_pick(mut self, pick_number: impl Into<String>) -> Self {
        self.pick_number = Some(pick_number.into());
        self
    }
}

/// Short-lived per-job log lines for live progress display.
pub trait LiveLogStore: Send + Sync {
    fn append(&self, job_id: i64, entry: LiveLogEntry);

    /// Entries strictly after `since`, or all of them.
    fn since(&self, job_id: i64, since: Option<DateTime<Utc>>) -> Vec<LiveLogEntry>;

    fn clear(&self, job_id: i64);
}

struct JobLog {
    entries: VecDeque<LiveLogEntry>,
    touched: Instant,
}

/// In-process [`LiveLogStore`] keeping the newest `max_entries` lines per
/// job. Every append first forgets jobs idle for longer than `ttl`, and idle
/// jobs read as empty.
pub struct InMemoryLogStore {
    logs: Mutex<HashMap<i64, JobLog>>,
    max_entries: usize,
    ttl: Duration,
}

impl InMemoryLogStore {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    fn logs(&self) -> std::sync::MutexGuard<'_, HashMap<i64, JobLog>> {
        self.logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_live(&self, log: &JobLog, now: Instant) -> bool {
        now.saturating_duration_since(log.touched) <= self.ttl
    }

    fn append_at(&self, job_id: i64, entry: LiveLogEntry, now: Instant) {
        let mut logs = self.logs();
        let before = logs.len();
        logs.retain(|_, log| self.is_live(log, now));
        if logs.len() < before {
            debug!(evicted = before - logs.len(), "idle job logs dropped");
        }

        let log = logs.entry(job_id).or_insert_with(|| JobLog {
            entries: VecDeque::new(),
            touched: now,
        });
        log.entries.push_back(entry);
        while log.entries.len() > self.max_entries {
            log.entries.pop_front();
        }
        log.touched = now;
    }

    fn since_at(&self, job_id: i64, since: Option<DateTime<Utc>>, now: Instant) -> Vec<LiveLogEntry> {
        let logs = self.logs();
        let Some(log) = logs.get(&job_id).filter(|log| self.is_live(log, now)) else {
            return Vec::new();
        };
        log.entries
            .iter()
            .filter(|e| since.map_or(true, |t| e.at > t))
            .cloned()
            .collect()
    }

    #[cfg(test)]
    fn job_count(&self) -> usize {
        self.logs().len()
    }
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_ENTRIES, DEFAULT_LOG_TTL)
    }
}

impl LiveLogStore for InMemoryLogStore {
    fn append(&self, job_id: i64, entry: LiveLogEntry) {
        self.append_at(job_id, entry, Instant::now());
    }

    fn since(&self, job_id: i64, since: Option<DateTime<Utc>>) -> Vec<LiveLogEntry> {
        self.since_at(job_id, since, Instant::now())
    }

    fn clear(&self, job_id: i64) {
        self.logs().remove(&job_id);
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// What a progress poll returns for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPoll {
    pub status: JobStatus,
    pub progress: JobProgress,
    pub error: Option<String>,
    pub logs: Vec<LiveLogEntry>,
}

pub fn poll_job(
    db: &Database,
    logs: &dyn LiveLogStore,
    job_id: i64,
    since: Option<DateTime<Utc>>,
) -> Result<Option<JobPoll>> {
    let Some(job) = db.load_job(job_id)? else {
        return Ok(None);
    };
    Ok(Some(JobPoll {
        status: job.status,
        progress: job.progress,
        error: job.error,
        logs: logs.since(job_id, since),
    }))
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runner settings shared by every batch.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub league_id: String,
    pub batch_picks: usize,
    pub batch_time_budget: Duration,
    pub lease: Duration,
    pub pool_path: Option<PathBuf>,
    pub author: Option<String>,
    /// Template for per-pick timeout, retries, backoff, and league hints.
    /// Range, budget, trace, and seed come from the job.
    pub generator: GeneratorOptions,
}

impl RunnerSettings {
    pub fn new(league_id: impl Into<String>) -> Self {
        Self {
            league_id: league_id.into(),
            batch_picks: DEFAULT_BATCH_PICKS,
            batch_time_budget: DEFAULT_BATCH_TIME_BUDGET,
            lease: DEFAULT_LEASE,
            pool_path: None,
            author: None,
            generator: GeneratorOptions::default(),
        }
    }
}

/// Result of one `run_batch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// More picks remain; call again.
    Pending { next_index: usize, generated_picks: usize },
    /// The draft was published.
    Done { draft_id: i64, generated_picks: usize },
    /// Another runner holds the lease.
    Busy,
    /// The job had already finished before this call.
    Finished(JobStatus),
}

pub struct JobRunner<'a> {
    db: &'a Database,
    provider: &'a dyn LeagueProvider,
    decision: &'a dyn DecisionStep,
    logs: &'a dyn LiveLogStore,
    settings: RunnerSettings,
}

impl<'a> JobRunner<'a> {
    pub fn new(
        db: &'a Database,
        provider: &'a dyn LeagueProvider,
        decision: &'a dyn DecisionStep,
        logs: &'a dyn LiveLogStore,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            db,
            provider,
            decision,
            logs,
            settings,
        }
    }

    /// Queue a new job.
    pub fn create_job(&self, config: &JobConfig, created_by: Option<&str>) -> Result<i64> {
        let id = self.db.create_job(config, created_by)?;
        self.logs.append(id, LiveLogEntry::new(LogKind::Info, "Job created"));
        info!(job_id = id, title = %config.title, "mock draft job created");
        Ok(id)
    }

    /// Run batches until the job finishes or another runner holds it.
    pub async fn run_to_completion(&self, job_id: i64) -> Result<BatchOutcome> {
        loop {
            match self.run_batch(job_id).await? {
                BatchOutcome::Pending { next_index, .. } => {
                    info!(job_id, next_index, "scheduling next batch");
                }
                other => return Ok(other),
            }
        }
    }

    /// Generate one batch of picks for `job_id`.
    ///
    /// Failures after the lease is taken mark the job as errored; the lease is
    /// released either way.
    pub async fn run_batch(&self, job_id: i64) -> Result<BatchOutcome> {
        let job = self
            .db
            .load_job(job_id)?
            .with_context(|| format!("job {job_id} not found"))?;
        if job.status.is_finished() {
            return Ok(BatchOutcome::Finished(job.status));
        }

        let Some(lease_id) = self.db.try_acquire_lease(job_id, self.settings.lease)? else {
            info!(job_id, "runner lease not acquired; another runner is active");
            return Ok(BatchOutcome::Busy);
        };

        let outcome = self.run_leased(&job, &lease_id).await;
        if let Err(e) = &outcome {
            error!(job_id, "mock draft job failed: {e:#}");
            self.logs
                .append(job_id, LiveLogEntry::new(LogKind::Error, format!("{e:#}")));
            if let Err(mark) = self.db.mark_job_error(job_id, &format!("{e:#}")) {
                warn!(job_id, "failed to record job error: {mark:#}");
            }
        }
        if let Err(e) = self.db.release_lease(job_id, &lease_id) {
            warn!(job_id, "failed to release job lease: {e:#}");
        }
        outcome
    }

    async fn run_leased(&self, job: &JobRecord, lease_id: &str) -> Result<BatchOutcome> {
        let job_id = job.id;
        let config = &job.config;
        let start = job.next_pick_index;

        self.db.mark_job_running(job_id)?;
        if start == 0 {
            self.logs.clear(job_id);
        }
        self.logs.append(
            job_id,
            LiveLogEntry::new(
                LogKind::Running,
                format!("Runner started (from pick index {start})"),
            ),
        );
        let existing = &job.result.picks;
        let pool = load_pool(self.settings.pool_path.as_deref(), Some(self.db))?
            .without(existing.iter().map(|p| p.player.name.as_str()));

        self.set_message(job, "Fetching league context…");

        let ctx = load_league_context(self.provider, &self.settings.league_id).await?;
        let seed = config.seed.unwrap_or(job_id as u64);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let order = mock_order(&ctx, config.rounds, Some(config.max_picks), &mut rng);
        let total = order.turns.len();

        let options = GeneratorOptions {
            start_index: start,
            max_picks_per_run: Some(self.settings.batch_picks),
            time_budget: Some(self.settings.batch_time_budget),
            trace: config.trace,
            seed: Some(seed),
            ..self.settings.generator.clone()
        };

        let sink = |update: &ProgressUpdate| self.on_progress(job_id, lease_id, update);

        let (new_picks, new_trace, next_index, stop_reason) =
            if pool.is_empty() && !existing.is_empty() {
                (Vec::new(), Vec::new(), start, StopReason::PoolExhausted)
            } else {
                let generator =
                    MockDraftGenerator::new(self.decision, options).with_progress(&sink);
                let outcome = generator.run(&order.turns, pool).await?;
                (outcome.picks, outcome.trace, outcome.next_index, outcome.stop_reason)
            };

        let added = new_picks.len();
        let mut result = job.result.clone();
        result.picks.extend(new_picks);
        if config.trace {
            result.trace.extend(new_trace);
        }

        let current_pick_number = result.picks.last().map(|p| p.pick_number.clone());
        let mut progress = JobProgress {
            message: current_pick_number
                .as_ref()
                .map_or_else(|| "Generated batch…".to_string(), |n| format!("Generated through {n}")),
            current_pick_number,
            generated_picks: result.picks.len(),
            total_picks: total,
            heartbeat_at: Some(Utc::now().to_rfc3339()),
        };

        let complete = result.picks.len() >= total
            || added == 0
            || stop_reason == StopReason::PoolExhausted;
        info!(job_id, added, merged = result.picks.len(), total, complete, "batch finished");

        if !complete {
            self.db.save_job_batch(job_id, next_index, &progress, &result)?;
            self.logs.append(
                job_id,
                LiveLogEntry::new(
                    LogKind::Info,
                    format!("Scheduling next batch (next index {next_index})…"),
                ),
            );
            return Ok(BatchOutcome::Pending {
                next_index,
                generated_picks: result.picks.len(),
            });
        }

        result.article = to_markdown_article(&config.title, &order.league_name, &result.picks);
        // Keep the finished log on the job even if publishing fails.
        self.db.save_job_batch(job_id, next_index, &progress, &result)?;

        let request = PublishRequest {
            title: &config.title,
            description: &config.description,
            author: self.settings.author.as_deref(),
            article: &result.article,
            picks: &result.picks,
            trace: config.trace.then_some(result.trace.as_slice()),
            league_id: Some(&order.league_id),
            model: Some(&config.model),
        };
        let draft_id = self
            .db
            .publish_mock_draft(&request.to_document())
            .context("failed to publish mock draft")?;

        result.draft_id = Some(draft_id);
        progress.message = "Complete.".to_string();
        self.db.mark_job_done(job_id, &progress, &result)?;
        self.logs
            .append(job_id, LiveLogEntry::new(LogKind::Done, "Job completed"));
        info!(job_id, draft_id, picks = result.picks.len(), "mock draft published");

        Ok(BatchOutcome::Done {
            draft_id,
            generated_picks: result.picks.len(),
        })
    }

    fn set_message(&self, job: &JobRecord, message: &str) {
        let progress = JobProgress {
            message: message.to_string(),
            heartbeat_at: Some(Utc::now().to_rfc3339()),
            ..job.progress.clone()
        };
        if let Err(e) = self.db.update_job_progress(job.id, &progress) {
            warn!(job_id = job.id, "failed to update job progress: {e:#}");
        }
        self.logs.append(job.id, LiveLogEntry::new(LogKind::Info, message));
    }

    /// Progress callback: live log, job progress, and lease heartbeat.
    fn on_progress(&self, job_id: i64, lease_id: &str, update: &ProgressUpdate) {
        self.logs.append(
            job_id,
            LiveLogEntry::new(LogKind::Pick, update.message.clone()).with_pick(update.pick_number.clone()),
        );

        let progress = JobProgress {
            message: update.message.clone(),
            current_pick_number: Some(update.pick_number.clone()),
            generated_picks: update.generated_picks,
            total_picks: update.total_picks,
            heartbeat_at: Some(Utc::now().to_rfc3339()),
        };
        if let Err(e) = self.db.update_job_progress(job_id, &progress) {
            warn!(job_id, "failed to update job progress: {e:#}");
        }
        match self.db.renew_lease(job_id, lease_id, self.settings.lease) {
            Ok(true) => {}
            Ok(false) => warn!(job_id, "job lease lost during batch"),
            Err(e) => warn!(job_id, "failed to renew job lease: {e:#}"),
        }
    }
}
