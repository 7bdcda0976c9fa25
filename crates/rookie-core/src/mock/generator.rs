// Pick-by-pick mock draft simulation.
//
// The decision step is an untrusted suggestion function. Every answer is
// checked against the presented candidates; anything else (timeouts, call
// failures, unparseable text, names outside the window) resolves to the best
// player available so a single pick can never stall the draft.

use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::draft::pick::{PickRecord, Prospect};
use crate::mock::prompt::{
    reason_template_for, style_token_for, system_prompt, user_prompt, LEAGUE_HINTS, STYLE_JITTER,
};
use crate::mock::sanitize::{fallback_reason, sanitize_reason};
use crate::mock::team::DraftTurn;
use crate::pool::{ProspectPool, PRESENTED_CANDIDATES};
use crate::protocol::{NoProgress, PickSource, ProgressSink, ProgressUpdate, StopReason, TraceEvent};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_PER_PICK_TIMEOUT: Duration = Duration::from_secs(25);
pub const MIN_PER_PICK_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Backoff before retry `n` (1-based) is `n * DEFAULT_RETRY_BACKOFF`.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(750);
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(50);

// ---------------------------------------------------------------------------
// Decision step
// ---------------------------------------------------------------------------

/// Everything the decision step sees for one pick.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub pick_number: String,
    pub team_name: String,
    pub persona: &'static str,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Names of the presented candidates, best first.
    pub candidates: Vec<String>,
    pub seed: Option<u64>,
}

/// External text generator choosing a player for a pick.
///
/// Returns the raw response text; parsing and validation happen in the
/// generator.
#[async_trait]
pub trait DecisionStep: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> anyhow::Result<String>;
}

/// The structured answer expected from the decision step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Decision {
    pub pick: String,
    #[serde(default)]
    pub reason: String,
}

/// Parse `{ "pick": "...", "reason": "..." }`, tolerating a surrounding
/// Markdown code fence. `None` when `pick` is missing or not a string.
pub fn parse_decision(raw: &str) -> Option<Decision> {
    let text = strip_code_fence(raw.trim());
    let value: Value = serde_json::from_str(text).ok()?;
    let pick = value.get("pick")?.as_str()?.to_string();
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Decision { pick, reason })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// 0-based index into the draft order to resume from.
    pub start_index: usize,
    /// Most picks to make in this run; `None` runs to the end.
    pub max_picks_per_run: Option<usize>,
    /// Wall-clock ceiling for the run; `None` is unbounded.
    pub time_budget: Option<Duration>,
    /// Per-attempt timeout, never below [`MIN_PER_PICK_TIMEOUT`].
    pub per_pick_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub trace: bool,
    /// Seeds style jitter and is forwarded to the decision step.
    pub seed: Option<u64>,
    pub league_hints: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            start_index: 0,
            max_picks_per_run: None,
            time_budget: Some(DEFAULT_TIME_BUDGET),
            per_pick_timeout: DEFAULT_PER_PICK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            trace: true,
            seed: None,
            league_hints: LEAGUE_HINTS.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockDraftError {
    #[error("player pool is empty")]
    EmptyPool,

    #[error("draft order is empty")]
    EmptyOrder,
}

/// Result of one generator run. A run cut short by the time budget or the
/// per-run limit is a valid partial result.
#[derive(Debug, Clone)]
pub struct MockDraftOutcome {
    /// Picks made in this run, in draft order.
    pub picks: Vec<PickRecord>,
    pub trace: Vec<TraceEvent>,
    pub stop_reason: StopReason,
    /// Index of the first pick not made; resume from here.
    pub next_index: usize,
    pub remaining_pool: ProspectPool,
    pub total_picks: usize,
}

/// The generator's choice before the pool is updated.
struct Selection {
    name: String,
    /// Unsanitized rationale.
    reason: String,
    source: PickSource,
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct MockDraftGenerator<'a> {
    decision: &'a dyn DecisionStep,
    progress: &'a dyn ProgressSink,
    options: GeneratorOptions,
}

impl<'a> MockDraftGenerator<'a> {
    pub fn new(decision: &'a dyn DecisionStep, options: GeneratorOptions) -> Self {
        Self {
            decision,
            progress: &NoProgress,
            options,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    fn report(&self, pick_number: &str, message: String, generated_picks: usize, total_picks: usize) {
        self.progress.report(&ProgressUpdate {
            pick_number: pick_number.to_string(),
            message,
            generated_picks,
            total_picks,
        });
    }

    /// Simulate picks `turns[start_index..]` against `pool`.
    ///
    /// Picks are made strictly in order; each pick sees the pool left by the
    /// previous one. Stops when the order is exhausted, the pool is empty, the
    /// time budget is spent, or the per-run limit is reached.
    pub async fn run(
        &self,
        turns: &[DraftTurn],
        pool: ProspectPool,
    ) -> Result<MockDraftOutcome, MockDraftError> {
        if pool.is_empty() {
            return Err(MockDraftError::EmptyPool);
        }
        if turns.is_empty() {
            return Err(MockDraftError::EmptyOrder);
        }

        let opts = &self.options;
        let start = opts.start_index.min(turns.len());
        let total = turns.len();
        let started = Instant::now();
        let mut rng = match opts.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(start as u64)),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut pool = pool;
        let mut picks: Vec<PickRecord> = Vec::new();
        let mut trace: Vec<TraceEvent> = Vec::new();
        let mut stop_reason = StopReason::Completed;
        let mut index = start;

        info!(start, total, pool = pool.len(), "mock draft run starting");

        while index < total {
            if pool.is_empty() {
                stop_reason = StopReason::PoolExhausted;
                break;
            }
            if opts.time_budget.is_some_and(|budget| started.elapsed() > budget) {
                stop_reason = StopReason::TimeBudget;
                break;
            }
            if opts.max_picks_per_run.is_some_and(|limit| picks.len() >= limit) {
                stop_reason = StopReason::BatchLimit;
                break;
            }

            let turn = &turns[index];
            let pick_number = turn.pick_number();
            self.report(
                &pick_number,
                format!("Generating… Pick {pick_number}"),
                start + picks.len(),
                total,
            );

            let counts = (start + picks.len(), total);
            let selection = self
                .select(index, turn, &pick_number, &pool, counts, &mut rng, &mut trace)
                .await;

            let popped = pool
                .pop_by_name(&selection.name)
                .or_else(|| pool.pop_best());
            let Some((player, rest)) = popped else {
                stop_reason = StopReason::PoolExhausted;
                break;
            };

            let reason = match selection.source {
                PickSource::Model => sanitize_reason(&selection.reason, &player.name),
                PickSource::Fallback if selection.reason.trim().is_empty() => sanitize_reason(
                    &fallback_reason(&player.name, &turn.team.team_name),
                    &player.name,
                ),
                PickSource::Fallback => sanitize_reason(&selection.reason, &player.name),
            };

            debug!(pick = %pick_number, team = %turn.team.team_name, player = %player.name, "pick made");
            if opts.trace {
                trace.push(TraceEvent::PickMade {
                    pick_number: pick_number.clone(),
                    team_name: turn.team.team_name.clone(),
                    player: player.name.clone(),
                    source: selection.source,
                });
            }

            picks.push(PickRecord {
                pick_number: pick_number.clone(),
                team_name: turn.team.team_name.clone(),
                player,
                reason,
            });
            pool = rest;
            index += 1;

            self.report(
                &pick_number,
                format!("Pick {pick_number} complete"),
                start + picks.len(),
                total,
            );
        }

        if stop_reason != StopReason::Completed {
            let elapsed_secs = started.elapsed().as_secs_f64();
            info!(?stop_reason, elapsed_secs, generated = picks.len(), "mock draft run stopped early");
            if opts.trace {
                trace.push(TraceEvent::StoppedEarly {
                    reason: stop_reason,
                    elapsed_secs,
                    generated_picks: picks.len(),
                });
            }
        } else {
            info!(generated = picks.len(), "mock draft run complete");
        }

        Ok(MockDraftOutcome {
            picks,
            trace,
            stop_reason,
            next_index: index,
            remaining_pool: pool,
            total_picks: total,
        })
    }

    /// Choose a player for one pick. Always returns a name in `pool`.
    /// `counts` is `(generated_picks, total_picks)` for progress reports.
    #[allow(clippy::too_many_arguments)]
    async fn select(
        &self,
        index: usize,
        turn: &DraftTurn,
        pick_number: &str,
        pool: &ProspectPool,
        counts: (usize, usize),
        rng: &mut ChaCha8Rng,
        trace: &mut Vec<TraceEvent>,
    ) -> Selection {
        let candidates: &[Prospect] = pool.top(PRESENTED_CANDIDATES);
        let best_name = candidates
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let fallback = |reason: String| Selection {
            name: best_name.clone(),
            reason,
            source: PickSource::Fallback,
        };

        let style = style_token_for(index, rng.gen_range(0..STYLE_JITTER));
        let request = DecisionRequest {
            pick_number: pick_number.to_string(),
            team_name: turn.team.team_name.clone(),
            persona: turn.team.persona,
            system_prompt: system_prompt(&turn.team, style),
            user_prompt: user_prompt(
                pick_number,
                &turn.team,
                candidates,
                &self.options.league_hints,
                reason_template_for(index),
            ),
            candidates: candidates.iter().map(|p| p.name.clone()).collect(),
            seed: self.options.seed,
        };

        let Some(raw) = self.call_with_retry(&request, counts, trace).await else {
            warn!(pick = %pick_number, "decision unavailable; taking best player available");
            if self.options.trace {
                trace.push(TraceEvent::DecisionUnavailable {
                    pick_number: pick_number.to_string(),
                });
            }
            return fallback(String::new());
        };

        let Some(decision) = parse_decision(&raw) else {
            warn!(pick = %pick_number, "malformed decision; taking best player available");
            if self.options.trace {
                trace.push(TraceEvent::MalformedResponse {
                    pick_number: pick_number.to_string(),
                    raw,
                });
            }
            return fallback(String::new());
        };

        let chosen = decision.pick.trim();
        if request.candidates.iter().any(|name| name == chosen) {
            return Selection {
                name: chosen.to_string(),
                reason: decision.reason,
                source: PickSource::Model,
            };
        }

        warn!(pick = %pick_number, choice = %decision.pick, corrected = %best_name, "choice outside candidates; corrected");
        if self.options.trace {
            trace.push(TraceEvent::Corrected {
                pick_number: pick_number.to_string(),
                original: decision.pick.clone(),
                corrected: best_name.clone(),
            });
        }
        fallback(decision.reason)
    }

    /// Call the decision step with a per-attempt timeout and linear backoff.
    /// `None` once every attempt has failed.
    async fn call_with_retry(
        &self,
        request: &DecisionRequest,
        (generated, total): (usize, usize),
        trace: &mut Vec<TraceEvent>,
    ) -> Option<String> {
        let timeout = self.options.per_pick_timeout.max(MIN_PER_PICK_TIMEOUT);
        let max_retries = self.options.max_retries;
        let pick_number = request.pick_number.as_str();

        for attempt in 0..=max_retries {
            if attempt > 0 {
                self.report(
                    pick_number,
                    format!(
                        "Retrying decision for {pick_number} (attempt {}/{})…",
                        attempt + 1,
                        max_retries + 1
                    ),
                    generated,
                    total,
                );
            }

            let message = match tokio::time::timeout(timeout, self.decision.decide(request)).await {
                Ok(Ok(raw)) => return Some(raw),
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => format!("decision timed out after {}ms", timeout.as_millis()),
            };

            warn!(pick = %pick_number, attempt, "decision call failed: {message}");
            if self.options.trace {
                trace.push(TraceEvent::CallFailed {
                    pick_number: pick_number.to_string(),
                    attempt,
                    message: message.clone(),
                });
            }
            self.report(
                pick_number,
                format!("Decision issue on {pick_number}: {message}"),
                generated,
                total,
            );

            if attempt < max_retries {
                tokio::time::sleep(self.options.retry_backoff * (attempt + 1)).await;
            }
        }

        None
    }
}
