//! `ModelSpec` and its knobs (spec §3).

use serde::{Deserialize, Serialize};

/// Thinking/reasoning effort level, used only when `thinking_enabled` is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Low,
    Medium,
    High,
}

/// Tri-state thinking-mode knob: off, or on with a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "enabled")]
pub enum Thinking {
    #[serde(rename = "false")]
    Off,
    #[serde(rename = "true")]
    On { level: ThinkingLevel },
}

impl Default for Thinking {
    fn default() -> Self {
        Thinking::Off
    }
}

/// What to invoke: a stable id, a human name, an opaque endpoint reference
/// consumed only by the adapter layer, and a set of knobs.
///
/// Invariant: `id` is unique within a race. Omitted knobs mean "adapter
/// default" — callers should prefer `None` over guessing a provider default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub name: String,
    pub endpoint_ref: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub thinking: Thinking,
    #[serde(default)]
    pub custom_prompt_template: Option<String>,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, endpoint_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint_ref: endpoint_ref.into(),
            temperature: None,
            top_p: None,
            thinking: Thinking::Off,
            custom_prompt_template: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thinking_is_off() {
        let spec = ModelSpec::new("m1", "Model One", "anthropic:claude");
        assert_eq!(spec.thinking, Thinking::Off);
        assert!(spec.temperature.is_none());
    }

    #[test]
    fn thinking_on_roundtrips_through_json() {
        let spec = ModelSpec {
            thinking: Thinking::On { level: ThinkingLevel::High },
            ..ModelSpec::new("m1", "Model One", "anthropic:claude")
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: ModelSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.thinking, Thinking::On { level: ThinkingLevel::High });
    }
}
