//! Default model registry (spec §6.2, §SPEC_FULL 4).
//!
//! `race/stream` and `wordle/stream` accept `models` as either bare id
//! strings (resolved here against a seeded registry) or full `ModelSpec`
//! objects. The registry itself is deliberately minimal — an in-memory map,
//! no persistence — since wiring to specific vendor SDKs and any persisted
//! model catalog are explicitly non-core (spec §1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::model_spec::ModelSpec;

/// One entry of the `models` array in a submission body: either a bare id
/// (resolved against the registry) or a fully-specified `ModelSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelRef {
    Id(String),
    Spec(ModelSpec),
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ModelSpec) {
        self.models.insert(spec.id.clone(), spec);
    }

    pub fn with_models(models: impl IntoIterator<Item = ModelSpec>) -> Self {
        let mut registry = Self::new();
        for m in models {
            registry.register(m);
        }
        registry
    }

    /// Resolves a submission's `models` array against this registry. A bare
    /// id that isn't registered is an `invalid_request` — the whole
    /// submission is rejected before any race starts (spec §7).
    pub fn resolve(&self, refs: &[ModelRef]) -> Result<Vec<ModelSpec>, RaceError> {
        refs.iter()
            .map(|r| match r {
                ModelRef::Spec(spec) => Ok(spec.clone()),
                ModelRef::Id(id) => self
                    .models
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RaceError::invalid_request(format!("unknown model id: {id}"))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::with_models([
            ModelSpec::new("claude-haiku", "Claude Haiku", "anthropic:claude-3-haiku-20240307"),
            ModelSpec::new("claude-sonnet", "Claude Sonnet", "anthropic:claude-sonnet-4-20250514"),
        ])
    }

    #[test]
    fn resolves_bare_ids_against_registered_models() {
        let refs = vec![ModelRef::Id("claude-haiku".to_string())];
        let resolved = registry().resolve(&refs).unwrap();
        assert_eq!(resolved[0].endpoint_ref, "anthropic:claude-3-haiku-20240307");
    }

    #[test]
    fn unknown_bare_id_is_invalid_request() {
        let refs = vec![ModelRef::Id("does-not-exist".to_string())];
        let err = registry().resolve(&refs).unwrap_err();
        assert!(err.is_pre_race());
    }

    #[test]
    fn full_model_spec_passes_through_unresolved() {
        let spec = ModelSpec::new("custom", "Custom", "anthropic:custom");
        let refs = vec![ModelRef::Spec(spec.clone())];
        let resolved = registry().resolve(&refs).unwrap();
        assert_eq!(resolved[0].id, spec.id);
    }

    #[test]
    fn mixed_ids_and_specs_resolve_in_order() {
        let refs = vec![
            ModelRef::Id("claude-sonnet".to_string()),
            ModelRef::Spec(ModelSpec::new("custom", "Custom", "anthropic:custom")),
        ];
        let resolved = registry().resolve(&refs).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].id, "claude-sonnet");
        assert_eq!(resolved[1].id, "custom");
    }
}
