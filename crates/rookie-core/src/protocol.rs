// Progress and trace messages emitted by the mock draft generator.

use serde::{Deserialize, Serialize};

/// Progress notification for one pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub pick_number: String,
    pub message: String,
    /// Picks generated so far in the whole draft, not just this run.
    pub generated_picks: usize,
    pub total_picks: usize,
}

/// Receiver of progress updates.
///
/// Reporting is fire-and-forget: implementations swallow their own failures
/// and must not block generation.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

/// Discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Where the selected player came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSource {
    /// Accepted from the decision step.
    Model,
    /// Best player available after a rejected or missing decision.
    Fallback,
}

/// Why a generator run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every pick in the requested range was made.
    Completed,
    PoolExhausted,
    TimeBudget,
    /// The per-run pick limit was reached; more picks remain.
    BatchLimit,
}

impl StopReason {
    /// Whether the draft can continue from where this run stopped.
    pub fn is_resumable(&self) -> bool {
        matches!(self, StopReason::TimeBudget | StopReason::BatchLimit)
    }
}

/// Post-hoc record of generator decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    PickMade {
        pick_number: String,
        team_name: String,
        player: String,
        source: PickSource,
    },
    /// The decision named a player outside the presented candidates.
    Corrected {
        pick_number: String,
        original: String,
        corrected: String,
    },
    MalformedResponse {
        pick_number: String,
        raw: String,
    },
    CallFailed {
        pick_number: String,
        attempt: u32,
        message: String,
    },
    /// Every attempt failed; best player available was used.
    DecisionUnavailable {
        pick_number: String,
    },
    StoppedEarly {
        reason: StopReason,
        elapsed_secs: f64,
        generated_picks: usize,
    },
}

impl TraceEvent {
    pub fn pick_number(&self) -> Option<&str> {
        match self {
            TraceEvent::PickMade { pick_number, .. }
            | TraceEvent::Corrected { pick_number, .. }
            | TraceEvent::MalformedResponse { pick_number, .. }
            | TraceEvent::CallFailed { pick_number, .. }
            | TraceEvent::DecisionUnavailable { pick_number } => Some(pick_number),
            TraceEvent::StoppedEarly { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[test]
    fn trace_event_is_tagged() {
        let event = TraceEvent::Corrected {
            pick_number: "1.04".into(),
            original: "Nobody".into(),
            corrected: "Somebody".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "corrected");
        assert_eq!(json["original"], "Nobody");
        assert_eq!(event.pick_number(), Some("1.04"));

        let stop = TraceEvent::StoppedEarly {
            reason: StopReason::TimeBudget,
            elapsed_secs: 61.5,
            generated_picks: 7,
        };
        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json["type"], "stopped_early");
        assert_eq!(json["reason"], "time_budget");
        assert_eq!(stop.pick_number(), None);
    }

    #[test]
    fn closures_are_progress_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |u: &ProgressUpdate| seen.lock().unwrap().push(u.pick_number.clone());
        sink.report(&ProgressUpdate {
            pick_number: "1.01".into(),
            message: "picked".into(),
            generated_picks: 1,
            total_picks: 24,
        });
        assert_eq!(seen.lock().unwrap().as_slice(), ["1.01"]);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        drop(rx);
        let sink = move |u: &ProgressUpdate| {
            let _ = tx.send(u.clone());
        };
        sink.report(&ProgressUpdate {
            pick_number: "1.01".into(),
            message: String::new(),
            generated_picks: 0,
            total_picks: 12,
        });
    }

    #[test]
    fn resumable_stop_reasons() {
        assert!(StopReason::BatchLimit.is_resumable());
        assert!(StopReason::TimeBudget.is_resumable());
        assert!(!StopReason::Completed.is_resumable());
        assert!(!StopReason::PoolExhausted.is_resumable());
    }
}
