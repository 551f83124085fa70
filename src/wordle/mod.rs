//! Wordle domain entities and feedback engine (spec §3, §4.5, §4.6).

pub mod feedback;
pub mod prompt;
pub mod words;

use serde::{Deserialize, Serialize};

use crate::race::Attempt;
use feedback::LetterFeedback;

pub const WORD_LENGTH: usize = 5;
pub const MAX_GUESSES: u8 = 6;

/// Fallback letter used to left-pad a guess that didn't parse to 5 clean
/// letters, so a malformed response still advances the game (spec §4.5
/// step 1) instead of stalling it.
const FALLBACK_LETTER: char = 'e';

/// Parse a model's raw output into a candidate 5-letter guess: trim, strip
/// non-alpha, lowercase, take the first 5 consecutive letters. Fewer than 5
/// clean letters are left-padded with [`FALLBACK_LETTER`] so the guess is
/// always submittable.
pub fn parse_guess(raw: &str) -> String {
    let letters: Vec<char> = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .take(WORD_LENGTH)
        .collect();

    if letters.len() >= WORD_LENGTH {
        return letters.into_iter().collect();
    }
    let pad = WORD_LENGTH - letters.len();
    std::iter::repeat(FALLBACK_LETTER).take(pad).chain(letters).collect()
}

/// `target_word` is exactly 5 lowercase letters; `word_length`/`max_guesses`
/// are fixed at 5/6 but kept as fields for wire compatibility (spec §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordlePuzzle {
    pub target_word: String,
    pub word_length: u8,
    pub max_guesses: u8,
}

impl WordlePuzzle {
    pub fn new(target_word: impl Into<String>) -> Self {
        Self { target_word: target_word.into(), word_length: WORD_LENGTH as u8, max_guesses: MAX_GUESSES }
    }
}

/// A specialization of [`Attempt`] carrying the parsed five-letter word, its
/// feedback vector, and its turn index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordleGuess {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub word: String,
    pub feedback: [LetterFeedback; WORD_LENGTH],
    pub guess_index: u8,
}

/// Per-model Wordle progress. At most `max_guesses` entries; `solved` and
/// `failed` are mutually exclusive, and once either is true the game is
/// frozen (no further guesses are appended).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WordleGameState {
    pub guesses: Vec<WordleGuess>,
    pub solved: bool,
    pub failed: bool,
    pub did_not_finish: bool,
    pub solved_at_guess: Option<u8>,
    pub time_to_solve_ms: Option<u64>,
}

impl WordleGameState {
    pub fn is_frozen(&self) -> bool {
        self.solved || self.failed
    }

    pub fn last_feedback(&self) -> Option<&[LetterFeedback; WORD_LENGTH]> {
        self.guesses.last().map(|g| &g.feedback)
    }

    /// Closeness score from the last guess, used to rank among unsolved games.
    /// Zero if no guesses were made at all.
    pub fn closeness(&self) -> u32 {
        self.last_feedback().map(feedback::closeness_score).unwrap_or(0)
    }
}

/// Per-model final standing (spec §3 WordleModelResult).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordleModelResult {
    pub model_id: String,
    pub solved: bool,
    pub guess_count: u8,
    pub time_to_solve_ms: Option<u64>,
    pub closeness_score: Option<u32>,
    pub correct_letters: Option<u32>,
    pub present_letters: Option<u32>,
    pub total_tokens: Option<u64>,
    pub total_cost: Option<f64>,
    pub did_not_finish: bool,
    pub rank: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_state_frozen_after_solve() {
        let mut gs = WordleGameState::default();
        assert!(!gs.is_frozen());
        gs.solved = true;
        assert!(gs.is_frozen());
        assert!(!gs.failed);
    }

    #[test]
    fn closeness_is_zero_with_no_guesses() {
        let gs = WordleGameState::default();
        assert_eq!(gs.closeness(), 0);
    }

    #[test]
    fn parse_guess_strips_and_lowercases() {
        assert_eq!(parse_guess("  CrAnE!! "), "crane");
    }

    #[test]
    fn parse_guess_takes_first_five_letters() {
        assert_eq!(parse_guess("crane is my answer"), "crane");
    }

    #[test]
    fn parse_guess_pads_short_output() {
        let parsed = parse_guess("app");
        assert_eq!(parsed.len(), WORD_LENGTH);
        assert!(parsed.ends_with("app"));
    }

    #[test]
    fn parse_guess_pads_empty_output() {
        let parsed = parse_guess("");
        assert_eq!(parsed, "eeeee");
    }
}
