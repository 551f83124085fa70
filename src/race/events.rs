//! Event Stream Transport wire types (C6, spec §4.7/§6.3).
//!
//! `RaceEvent` is the single typed channel the engine (C5) writes to and the
//! transport ([`crate::transport`]) reads from, grounded on the teacher's
//! `ProgressEvent` (`benchmarks::types`) — but tagged flat (`{type, field}`)
//! rather than `{type, content}` to match the wire shapes in §6.3 exactly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model_spec::ModelSpec;
use crate::race::{Attempt, ModelScore, RaceState};
use crate::wordle::{WordleGameState, WordleModelResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PuzzleConfigView {
    Crossword { rounds: Vec<crate::crossword::Round> },
    Wordle { word_length: u8, max_guesses: u8, target_word: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfigView {
    pub id: String,
    pub name: String,
    pub models: Vec<ModelSpec>,
    #[serde(flatten)]
    pub puzzle: PuzzleConfigView,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClueResult {
    pub clue_id: String,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_id: String,
    pub clue_results: Vec<ClueResult>,
    pub model_scores: Vec<ModelScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResult {
    pub race_id: String,
    pub model_scores: Vec<ModelScore>,
    pub rounds: Vec<RoundResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordleRaceResult {
    pub race_id: String,
    pub target_word: String,
    pub winner: Option<String>,
    pub model_results: Vec<WordleModelResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RaceResultView {
    Crossword(RaceResult),
    Wordle(WordleRaceResult),
}

/// `model_states` is serialized as an ordered key->value structure keyed by
/// model id (spec §4.5 "state serialization for transport").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordleStateView {
    pub status: crate::race::RaceStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub model_states: HashMap<String, WordleGameState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateView {
    Crossword(RaceState),
    Wordle(WordleStateView),
}

/// Every lifecycle event the engine can emit (spec §4.7). Internally tagged
/// on `type`, flat field layout — `{"type": "attempt", "attempt": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    Config { config: RaceConfigView },
    State { state: StateView },
    ModelStart { model_id: String, guess_index: Option<u8> },
    ReasoningDelta { model_id: String, guess_index: Option<u8>, delta: String },
    Attempt { attempt: Attempt },
    Clue { clue_id: String, attempts: Vec<Attempt> },
    Round { round_result: RoundResult },
    Guess { guess: crate::wordle::WordleGuess },
    ModelComplete { model_id: String, game_state: WordleGameState },
    Complete { result: RaceResultView },
    Error { error: String, details: Option<String> },
}

/// Tracks the last-sent reasoning text per `(model_id, guess_index)` so the
/// transport can send only the suffix since the previous chunk (spec §4.7 —
/// "the transport computes the string suffix since the previous chunk").
/// `guess_index` is `None` for Crossword attempts (one reasoning stream per
/// clue per model).
#[derive(Debug, Default)]
pub struct ReasoningDiffTracker {
    sent: HashMap<(String, Option<u8>), String>,
}

impl ReasoningDiffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Given the full reasoning text accumulated so far, returns the suffix
    /// not yet sent for this `(model_id, guess_index)`, or `None` if there is
    /// nothing new.
    pub fn diff(&mut self, model_id: &str, guess_index: Option<u8>, full_text_so_far: &str) -> Option<String> {
        let key = (model_id.to_string(), guess_index);
        let previous = self.sent.entry(key).or_insert_with(String::new);
        if full_text_so_far.len() <= previous.len() {
            return None;
        }
        let suffix = full_text_so_far[previous.len()..].to_string();
        *previous = full_text_so_far.to_string();
        Some(suffix)
    }

    pub fn reset(&mut self, model_id: &str, guess_index: Option<u8>) {
        self.sent.remove(&(model_id.to_string(), guess_index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_diff_tracker_sends_only_the_new_suffix() {
        let mut tracker = ReasoningDiffTracker::new();
        assert_eq!(tracker.diff("m1", None, "Thinking").as_deref(), Some("Thinking"));
        assert_eq!(tracker.diff("m1", None, "Thinking about it").as_deref(), Some(" about it"));
        assert_eq!(tracker.diff("m1", None, "Thinking about it"), None);
    }

    #[test]
    fn reasoning_diff_tracker_is_keyed_per_guess_index() {
        let mut tracker = ReasoningDiffTracker::new();
        tracker.diff("m1", Some(0), "first guess reasoning");
        assert_eq!(tracker.diff("m1", Some(1), "second").as_deref(), Some("second"));
    }

    #[test]
    fn error_event_serializes_with_flat_type_tag() {
        let event = RaceEvent::Error { error: "boom".to_string(), details: None };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn reasoning_delta_carries_model_and_guess_index() {
        let event = RaceEvent::ReasoningDelta { model_id: "m1".into(), guess_index: Some(2), delta: "..".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reasoning_delta");
        assert_eq!(json["guess_index"], 2);
    }
}
