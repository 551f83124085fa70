//! Race Engine (C5, spec §4.4/§4.5) and its shared data model (spec §3).
//!
//! [`crossword`] and [`wordle`] hold the two mode-specific execution loops;
//! this module holds the entities both share plus the per-race handle that
//! wires the engine task to an event channel the way the teacher's
//! `Orchestrator::run_evaluation` wires a benchmark run to a progress
//! channel.

pub mod crossword;
pub mod events;
pub mod wordle;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use events::RaceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// Per-attempt error kind (spec §7). Never escapes a single [`Attempt`] —
/// this is not [`crate::error::RaceError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptErrorKind {
    Timeout,
    AdapterFailure(String),
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The record of one adapter invocation (spec §3 Attempt).
///
/// Invariant: `t_request_ms <= t_first_ms.unwrap_or(t_last_ms) <= t_last_ms`;
/// if `t_first_ms` is unset then `ttft_ms` is unset; if `error` is set then
/// `format_ok = correct = false` and `clue_score = 0`. All `_ms` timestamps
/// are monotonic milliseconds since the owning race's start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub model_id: String,
    #[serde(default)]
    pub clue_id: Option<String>,
    pub t_request_ms: u64,
    pub t_first_ms: Option<u64>,
    pub t_last_ms: u64,
    pub e2e_ms: u64,
    pub ttft_ms: Option<u64>,
    pub output: String,
    pub normalized: String,
    pub format_ok: bool,
    pub correct: bool,
    pub clue_score: f64,
    pub token_usage: Option<TokenUsage>,
    pub error: Option<AttemptErrorKind>,
}

impl Attempt {
    /// An empty placeholder attempt, used when a model never got a chance to
    /// respond (e.g. `end_early` before its turn started).
    pub fn empty(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            clue_id: None,
            t_request_ms: 0,
            t_first_ms: None,
            t_last_ms: 0,
            e2e_ms: 0,
            ttft_ms: None,
            output: String::new(),
            normalized: String::new(),
            format_ok: false,
            correct: false,
            clue_score: 0.0,
            token_usage: None,
            error: Some(AttemptErrorKind::Cancelled),
        }
    }
}

/// Aggregate per-model Crossword standing (spec §3 ModelScore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub model_id: String,
    pub total_correct: u32,
    pub total_attempts: u32,
    pub accuracy_pct: f64,
    pub avg_score: f64,
    pub median_e2e_ms: f64,
    pub median_ttft_ms: Option<f64>,
    pub e2e_variance: f64,
    pub rank: u32,
}

/// Public progress view (spec §3 RaceState).
///
/// Invariant: `progress_pct = round(100 * completed / total)`; `status` is
/// monotonic along pending -> running -> (completed | error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceState {
    pub status: RaceStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_clues: u32,
    pub total_clues: u32,
    pub progress_pct: u32,
    pub current_round_id: Option<String>,
    pub current_clue_id: Option<String>,
    pub model_states: HashMap<String, crate::wordle::WordleGameState>,
}

impl RaceState {
    pub fn new_pending(total_clues: u32) -> Self {
        Self {
            status: RaceStatus::Pending,
            started_at: None,
            completed_at: None,
            completed_clues: 0,
            total_clues,
            progress_pct: 0,
            current_round_id: None,
            current_clue_id: None,
            model_states: HashMap::new(),
        }
    }

    pub fn recompute_progress(&mut self) {
        self.progress_pct = if self.total_clues == 0 {
            100
        } else {
            ((100.0 * self.completed_clues as f64 / self.total_clues as f64).round()) as u32
        };
    }
}

/// Handle to a running race: the task driving it, plus its event channel and
/// an `end_early`/disconnect cancellation source.
pub struct RaceHandle<T> {
    pub join: JoinHandle<T>,
    pub cancel: CancellationToken,
}

impl<T> RaceHandle<T> {
    pub fn end_early(&self) {
        self.cancel.cancel();
    }
}

/// Builds an `(mpsc sender, RaceHandle)` pair the way
/// `Orchestrator::run_evaluation` returns `(EvaluationRun, Receiver)`: the
/// caller gets the receiver immediately and the handle once the task is
/// spawned.
pub fn event_channel() -> (mpsc::UnboundedSender<RaceEvent>, mpsc::UnboundedReceiver<RaceEvent>) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_pct_rounds_correctly() {
        let mut state = RaceState::new_pending(3);
        state.completed_clues = 1;
        state.recompute_progress();
        assert_eq!(state.progress_pct, 33);
        state.completed_clues = 2;
        state.recompute_progress();
        assert_eq!(state.progress_pct, 67);
        state.completed_clues = 3;
        state.recompute_progress();
        assert_eq!(state.progress_pct, 100);
    }

    #[test]
    fn empty_attempt_is_cancelled_and_scoreless() {
        let a = Attempt::empty("m1");
        assert_eq!(a.clue_score, 0.0);
        assert!(!a.correct);
        assert_eq!(a.error, Some(AttemptErrorKind::Cancelled));
    }
}
