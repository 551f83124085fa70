//! Wordle feedback computation (C2, spec §4.6): pure, duplicate-letter-aware.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterFeedback {
    Correct,
    Present,
    Absent,
}

pub const WORD_LENGTH: usize = 5;

/// Two-pass algorithm: greens consume positions first, then yellows scan the
/// remaining unconsumed target positions left-to-right. A naive single pass
/// over-counts duplicate letters; this must stay two-pass (spec §4.6).
pub fn feedback(guess: &[u8; WORD_LENGTH], target: &[u8; WORD_LENGTH]) -> [LetterFeedback; WORD_LENGTH] {
    let mut result = [LetterFeedback::Absent; WORD_LENGTH];
    let mut target_consumed = [false; WORD_LENGTH];
    let mut guess_consumed = [false; WORD_LENGTH];

    for i in 0..WORD_LENGTH {
        if guess[i] == target[i] {
            result[i] = LetterFeedback::Correct;
            target_consumed[i] = true;
            guess_consumed[i] = true;
        }
    }

    for i in 0..WORD_LENGTH {
        if guess_consumed[i] {
            continue;
        }
        if let Some(j) = (0..WORD_LENGTH).find(|&j| !target_consumed[j] && target[j] == guess[i]) {
            result[i] = LetterFeedback::Present;
            target_consumed[j] = true;
        }
    }

    result
}

/// Convenience wrapper for ASCII lowercase 5-letter `&str` inputs.
pub fn feedback_str(guess: &str, target: &str) -> Option<[LetterFeedback; WORD_LENGTH]> {
    let g: [u8; WORD_LENGTH] = guess.as_bytes().try_into().ok()?;
    let t: [u8; WORD_LENGTH] = target.as_bytes().try_into().ok()?;
    Some(feedback(&g, &t))
}

/// `3 * #correct + 1 * #present`, capped implicitly at 15 (5 correct max).
pub fn closeness_score(fb: &[LetterFeedback; WORD_LENGTH]) -> u32 {
    let correct = fb.iter().filter(|f| **f == LetterFeedback::Correct).count() as u32;
    let present = fb.iter().filter(|f| **f == LetterFeedback::Present).count() as u32;
    3 * correct + present
}
