//! Event Stream Transport, concretized over HTTP/SSE (C6, spec §4.7/§6.2-6.3).
//!
//! [`crate::race::events::RaceEvent`] is the wire format already; this
//! module is purely the HTTP plumbing around it — request parsing,
//! `axum::Router` assembly, and SSE framing — kept separate from the engine
//! (C5) the way the teacher keeps `ai::llm::streaming` separate from
//! `RacingClient`.

pub mod dto;
pub mod routes;
pub mod server;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::adapter::anthropic::AnthropicAdapter;
use crate::adapter::StreamingAdapter;
use crate::config::AppConfig;
use crate::error::RaceError;
use crate::model_spec::ModelSpec;
use crate::registry::ModelRegistry;
use crate::wordle::words::{StaticWordSource, WordSource};

/// Shared, read-only process state handed to every route (grounded on the
/// `State<T>` extractor pattern used throughout the pack's axum examples).
pub struct AppState {
    pub config: AppConfig,
    pub registry: ModelRegistry,
    pub word_source: Arc<dyn WordSource>,
    /// Session-level cancellation source per in-flight race, keyed by
    /// `race_id` — how `end_early` (spec §4.5) reaches a race that's already
    /// streaming. Entries are removed once the race's event channel closes.
    pub active_races: Mutex<HashMap<String, CancellationToken>>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: ModelRegistry) -> Self {
        Self {
            config,
            registry,
            word_source: Arc::new(StaticWordSource::default()),
            active_races: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a newly-spawned race's cancellation source so a later
    /// `end_early` call can find it.
    pub async fn register_race(&self, race_id: impl Into<String>, cancel: CancellationToken) {
        self.active_races.lock().await.insert(race_id.into(), cancel);
    }

    /// Removes a race's cancellation source once its event stream has ended
    /// (normal completion or error) — an `end_early` after this point is a 404.
    pub async fn unregister_race(&self, race_id: &str) {
        self.active_races.lock().await.remove(race_id);
    }

    /// Signals `end_early` (spec §4.5) for a still-running race. Returns
    /// `false` if no race with that id is currently in flight.
    pub async fn end_early(&self, race_id: &str) -> bool {
        match self.active_races.lock().await.get(race_id) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Builds the one concrete adapter this crate wires (spec §4.2/§9: wiring
/// to specific vendor SDKs is explicitly non-core — `anthropic:` is the only
/// prefix understood here). An `endpoint_ref` with an unrecognized prefix is
/// an `invalid_request`, rejected before the race starts.
pub fn build_adapter(spec: &ModelSpec) -> Result<Arc<dyn StreamingAdapter>, RaceError> {
    match spec.endpoint_ref.split_once(':') {
        Some(("anthropic", model_name)) => {
            let adapter = AnthropicAdapter::from_env(model_name)
                .map_err(|e| RaceError::invalid_request(format!("{}: {e}", spec.id)))?;
            Ok(Arc::new(adapter))
        }
        _ => Err(RaceError::invalid_request(format!(
            "model '{}' has an unsupported endpoint_ref '{}' (only 'anthropic:<model>' is wired)",
            spec.id, spec.endpoint_ref
        ))),
    }
}

impl IntoResponse for RaceError {
    /// Per spec §7: `invalid_request` is the only kind surfaced as an HTTP
    /// error before any race starts — everything else that could escape to
    /// here is a transport/engine fault, mapped to 500.
    fn into_response(self) -> Response {
        let status = if self.is_pre_race() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
