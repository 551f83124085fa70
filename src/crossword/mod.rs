//! Crossword domain entities (spec §3).

pub mod prompt;

use serde::{Deserialize, Serialize};

use crate::normalize::{CaseRule, OutputRule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clue {
    pub clue_id: String,
    pub prompt: String,
    pub answer: String,
    pub length: usize,
    #[serde(default)]
    pub allow_hyphen: bool,
    #[serde(default)]
    pub case_rule: CaseRule,
}

/// An ordered sequence of clues sharing scoring and output rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_id: String,
    pub clues: Vec<Clue>,
    #[serde(default)]
    pub output_rule: OutputRule,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
}

/// Mirrors `AppConfig::default_max_tokens_crossword` (spec §6.4) so a
/// submission may omit a per-round cap and fall back to the process default.
fn default_max_tokens() -> u32 {
    16
}

/// Mirrors `AppConfig::default_timeout_ms_crossword` (spec §6.4).
fn default_time_limit_ms() -> u64 {
    4000
}
