//! A minimal curated target-word source.
//!
//! Puzzle content sources are explicitly out of scope for the core (spec
//! §1 — "the Wordle word list" is named as an external collaborator). This
//! module exists only so `wordle/stream` has *something* to draw from when
//! a caller omits `target_word` (spec §6.2); production deployments are
//! expected to supply a real [`WordSource`] backed by the external list.

use rand::seq::IndexedRandom;

/// A source of candidate Wordle target words. Swappable so the bundled
/// [`StaticWordSource`] can be replaced with a real word-list collaborator
/// without touching the race engine or transport layer.
pub trait WordSource: Send + Sync {
    fn random_target(&self) -> String;
}

/// A small fixed list of common 5-letter words, used only as the bundled
/// default. Not a substitute for a real curated Wordle word list.
pub struct StaticWordSource {
    words: Vec<String>,
}

const DEFAULT_WORDS: &[&str] =
    &["crane", "slate", "adieu", "raise", "stone", "tiger", "mango", "plumb", "brisk", "vivid"];

impl StaticWordSource {
    pub fn new(words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { words: words.into_iter().map(Into::into).collect() }
    }
}

impl Default for StaticWordSource {
    fn default() -> Self {
        Self::new(DEFAULT_WORDS)
    }
}

impl WordSource for StaticWordSource {
    fn random_target(&self) -> String {
        let mut rng = rand::rng();
        self.words.choose(&mut rng).cloned().unwrap_or_else(|| "crane".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_target_is_always_five_lowercase_letters() {
        let source = StaticWordSource::default();
        for _ in 0..20 {
            let word = source.random_target();
            assert_eq!(word.len(), 5);
            assert!(word.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn custom_word_list_is_honored() {
        let source = StaticWordSource::new(["zzzzz"]);
        assert_eq!(source.random_target(), "zzzzz");
    }
}
