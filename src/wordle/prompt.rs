//! Wordle prompt template rendering (spec §6.1).

use super::feedback::LetterFeedback;
use super::WordleGameState;

const PREVIOUS_GUESSES_TOKEN: &str = "{{PREVIOUS_GUESSES}}";

fn glyph(f: LetterFeedback) -> char {
    match f {
        LetterFeedback::Correct => '🟩',
        LetterFeedback::Present => '🟨',
        LetterFeedback::Absent => '⬜',
    }
}

/// Render one `Guess k: WORD` line followed by its feedback glyph string.
fn render_guess_history(state: &WordleGameState) -> String {
    state
        .guesses
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let glyphs: String = g.feedback.iter().map(|f| glyph(*f)).collect();
            format!("Guess {}: {}\n{}", i + 1, g.word.to_uppercase(), glyphs)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const DEFAULT_TEMPLATE: &str = "You are playing Wordle. Guess a 5-letter English word.\n\n\
Rules:\n\
- Each guess must be exactly 5 lowercase letters.\n\
- Feedback uses: 🟩 = correct letter & position, 🟨 = correct letter, wrong position, ⬜ = letter not in the word.\n\
- Do not repeat a guess you have already made.\n\
- Respond with only the next 5-letter lowercase word, nothing else.\n\n\
Previous guesses:\n{{PREVIOUS_GUESSES}}";

/// Render the prompt for the next guess. The target word is never included.
/// When a model carries a `custom_prompt_template`, the literal token
/// `{{PREVIOUS_GUESSES}}` is interpolated if present; otherwise the rendered
/// history is appended after the template.
pub fn render(state: &WordleGameState, custom_template: Option<&str>) -> String {
    let history = render_guess_history(state);
    let history = if history.is_empty() { "(none yet)".to_string() } else { history };

    match custom_template {
        Some(template) if template.contains(PREVIOUS_GUESSES_TOKEN) => {
            template.replace(PREVIOUS_GUESSES_TOKEN, &history)
        }
        Some(template) => format!("{template}\n{history}"),
        None => DEFAULT_TEMPLATE.replace(PREVIOUS_GUESSES_TOKEN, &history),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::Attempt;
    use crate::wordle::WordleGuess;

    fn guess(word: &str, feedback: [LetterFeedback; 5]) -> WordleGuess {
        WordleGuess {
            attempt: Attempt::empty("m1"),
            word: word.to_string(),
            feedback,
            guess_index: 0,
        }
    }

    #[test]
    fn default_template_never_leaks_target() {
        let state = WordleGameState::default();
        let rendered = render(&state, None);
        assert!(!rendered.contains("crane"));
        assert!(rendered.contains("(none yet)"));
    }

    #[test]
    fn history_lists_prior_guesses_with_glyphs() {
        let mut state = WordleGameState::default();
        state.guesses.push(guess(
            "slate",
            [
                LetterFeedback::Absent,
                LetterFeedback::Absent,
                LetterFeedback::Absent,
                LetterFeedback::Correct,
                LetterFeedback::Present,
            ],
        ));
        let rendered = render(&state, None);
        assert!(rendered.contains("Guess 1: SLATE"));
        assert!(rendered.contains('🟩'));
        assert!(rendered.contains('🟨'));
    }

    #[test]
    fn custom_template_interpolates_token() {
        let state = WordleGameState::default();
        let rendered = render(&state, Some("Custom intro.\n{{PREVIOUS_GUESSES}}\nGo."));
        assert!(rendered.starts_with("Custom intro."));
        assert!(rendered.ends_with("Go."));
    }

    #[test]
    fn custom_template_without_token_gets_history_appended() {
        let state = WordleGameState::default();
        let rendered = render(&state, Some("Custom intro only."));
        assert!(rendered.starts_with("Custom intro only."));
        assert!(rendered.contains("(none yet)"));
    }
}
