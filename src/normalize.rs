//! Deterministic string normalization and format validation (C1, spec §4.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRule {
    Plain,
    Json,
}

impl Default for OutputRule {
    fn default() -> Self {
        OutputRule::Json
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseRule {
    Lower,
    Upper,
    Title,
    #[serde(rename = "as-is")]
    AsIs,
}

impl Default for CaseRule {
    fn default() -> Self {
        CaseRule::Lower
    }
}

/// Whether a code point should be stripped as punctuation: anything that
/// isn't alphanumeric in any script (`char::is_alphanumeric` is Unicode-aware,
/// not ASCII-only), unless it's `-` and hyphens are allowed for this clue.
fn is_stripped_punctuation(c: char, allow_hyphen: bool) -> bool {
    if c == '-' && allow_hyphen {
        return false;
    }
    !c.is_alphanumeric()
}

fn apply_case(s: &str, rule: CaseRule) -> String {
    match rule {
        CaseRule::Lower => s.to_lowercase(),
        CaseRule::Upper => s.to_uppercase(),
        CaseRule::AsIs => s.to_string(),
        CaseRule::Title => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

/// Extract the `answer` field from a raw JSON object string. Parse failure
/// (or a missing/non-string `answer`) yields an empty string, not an error —
/// format validation downstream is what flags this as invalid.
fn extract_json_answer(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map
            .get("answer")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Strip spaces and Unicode punctuation (preserving hyphens iff
/// `allow_hyphen`), then apply the case rule.
fn strip_and_case(raw: &str, case_rule: CaseRule, allow_hyphen: bool) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !is_stripped_punctuation(*c, allow_hyphen))
        .collect();
    apply_case(&stripped, case_rule)
}

/// Normalize raw model output per spec §4.1: JSON extraction (if applicable),
/// punctuation/space stripping, case folding.
pub fn normalize(raw: &str, output_rule: OutputRule, case_rule: CaseRule, allow_hyphen: bool) -> String {
    let extracted = match output_rule {
        OutputRule::Json => extract_json_answer(raw),
        OutputRule::Plain => raw.to_string(),
    };
    strip_and_case(&extracted, case_rule, allow_hyphen)
}

/// `format_ok`: for json mode, parse must have succeeded and `answer` must be
/// a non-empty string; in both modes, the normalized length must equal the
/// clue's declared length.
pub fn format_ok(raw: &str, normalized: &str, clue_length: usize, output_rule: OutputRule) -> bool {
    if matches!(output_rule, OutputRule::Json) && extract_json_answer(raw).is_empty() {
        return false;
    }
    normalized.chars().count() == clue_length
}

/// Normalize the canonical answer the same way (plain mode, same case rule,
/// `allow_hyphen = false`) and compare byte-for-byte.
pub fn is_correct(normalized_output: &str, canonical_answer: &str, case_rule: CaseRule) -> bool {
    let canonical_normalized = normalize(canonical_answer, OutputRule::Plain, case_rule, false);
    normalized_output == canonical_normalized
}
