//! Wire request bodies for the two session endpoints (spec §6.2).
//!
//! Per-event wire shapes are `crate::race::events::RaceEvent` itself — this
//! module only holds what a client posts to start a race, grounded on
//! `ai::llm::streaming`'s parse-then-convert pattern (`SseEvent` ->
//! `StreamEvent`), here applied to inbound rather than outbound JSON.

use serde::Deserialize;

use crate::crossword::Round;
use crate::registry::ModelRef;

#[derive(Debug, Clone, Deserialize)]
pub struct RaceStreamRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub models: Vec<ModelRef>,
    pub rounds: Vec<Round>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordleStreamRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub models: Vec<ModelRef>,
    #[serde(default)]
    pub target_word: Option<String>,
    #[serde(default)]
    pub include_user: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_stream_request_accepts_bare_id_and_full_spec_models() {
        let body = r#"{
            "models": ["claude-haiku", {"id":"m2","name":"M2","endpoint_ref":"anthropic:m2"}],
            "rounds": []
        }"#;
        let req: RaceStreamRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.models.len(), 2);
    }

    #[test]
    fn wordle_stream_request_defaults_target_word_and_include_user() {
        let body = r#"{"models": ["m1"]}"#;
        let req: WordleStreamRequest = serde_json::from_str(body).unwrap();
        assert!(req.target_word.is_none());
        assert!(!req.include_user);
    }
}
