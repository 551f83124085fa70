//! SSE handlers for the two session endpoints (spec §6.2/§6.3).
//!
//! Grounded on the pack's axum handler idiom (`State<T>` extractor, `Json<T>`
//! body, `#[instrument]`) applied to a streaming response instead of a single
//! JSON reply: the engine's `mpsc::UnboundedReceiver<RaceEvent>` is adapted
//! into an SSE body via `futures::stream::unfold`, one `data:` frame per
//! event, each carrying its own `{"type": ...}` discriminant already.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::stream::{self, Stream};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use super::dto::{RaceStreamRequest, WordleStreamRequest};
use super::{build_adapter, AppState};
use crate::adapter::StreamingAdapter;
use crate::error::RaceError;
use crate::race::crossword::{self, CrosswordRaceConfig};
use crate::race::events::RaceEvent;
use crate::race::wordle::{self, WordleRaceConfig};
use crate::model_spec::ModelSpec;

type EventStream = Sse<std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Adapts the engine's `mpsc::UnboundedReceiver<RaceEvent>` into an SSE body.
/// `on_done` fires once the channel closes (normal completion or error),
/// unregistering the race's `end_early` cancellation source — it does *not*
/// fire on client disconnect, since a dropped client leaves the engine
/// unaffected (spec §4.7).
fn into_sse(rx: mpsc::UnboundedReceiver<RaceEvent>, state: Arc<AppState>, race_id: String) -> EventStream {
    let stream = stream::unfold(Some(rx), move |rx| {
        let state = state.clone();
        let race_id = race_id.clone();
        async move {
            let mut rx = rx?;
            match rx.recv().await {
                Some(event) => {
                    let frame = Event::default().json_data(event).unwrap_or_else(|_| Event::default().data("{}"));
                    Some((Ok(frame), Some(rx)))
                }
                None => {
                    state.unregister_race(&race_id).await;
                    None
                }
            }
        }
    });
    Sse::new(Box::pin(stream)).keep_alive(KeepAlive::default())
}

/// Resolves a submission's models against the registry and enforces the
/// public model cap (spec §6.4 `public_max_models`), then builds one adapter
/// per model. Rejecting here keeps every failure pre-race (spec §7).
fn resolve_models_and_adapters(
    state: &AppState,
    models: Vec<crate::registry::ModelRef>,
) -> Result<(Vec<ModelSpec>, HashMap<String, Arc<dyn StreamingAdapter>>), RaceError> {
    if models.is_empty() {
        return Err(RaceError::invalid_request("models must not be empty"));
    }
    if !state.config.unrestricted_mode && models.len() > state.config.public_max_models {
        return Err(RaceError::invalid_request(format!(
            "requested {} models, exceeds public_max_models ({})",
            models.len(),
            state.config.public_max_models
        )));
    }

    let resolved = state.registry.resolve(&models)?;
    let adapters = resolved
        .iter()
        .map(|spec| build_adapter(spec).map(|a| (spec.id.clone(), a)))
        .collect::<Result<HashMap<_, _>, RaceError>>()?;
    Ok((resolved, adapters))
}

#[instrument(skip(state, body))]
pub async fn race_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RaceStreamRequest>,
) -> Result<EventStream, RaceError> {
    if body.rounds.is_empty() {
        return Err(RaceError::invalid_request("rounds must not be empty"));
    }
    let (models, adapters) = resolve_models_and_adapters(&state, body.models)?;

    let race_id = format!("race-{}", Uuid::new_v4());
    let config = CrosswordRaceConfig {
        id: race_id.clone(),
        name: body.name.unwrap_or_else(|| "Crossword Race".to_string()),
        rounds: body.rounds,
        models,
        created_at: Utc::now(),
        speed_bonus_threshold_ms: state.config.speed_bonus_threshold_ms,
        max_concurrent_models: state.config.public_max_models,
    };

    let (tx, rx) = crate::race::event_channel();
    let cancel = CancellationToken::new();
    let handle = crate::race::RaceHandle { join: tokio::spawn(crossword::run(config, adapters, tx, cancel.clone())), cancel };
    state.register_race(race_id.clone(), handle.cancel.clone()).await;
    Ok(into_sse(rx, state, race_id))
}

#[instrument(skip(state, body))]
pub async fn wordle_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WordleStreamRequest>,
) -> Result<EventStream, RaceError> {
    let (models, adapters) = resolve_models_and_adapters(&state, body.models)?;
    let target_word = body.target_word.unwrap_or_else(|| state.word_source.random_target());
    if target_word.len() != 5 || !target_word.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RaceError::invalid_request("target_word must be exactly 5 ascii letters"));
    }

    let race_id = format!("race-{}", Uuid::new_v4());
    let config = WordleRaceConfig {
        id: race_id.clone(),
        name: body.name.unwrap_or_else(|| "Wordle Race".to_string()),
        models,
        target_word: target_word.to_lowercase(),
        include_user: body.include_user,
        created_at: Utc::now(),
        max_output_tokens: state.config.default_max_tokens_wordle,
        timeout_ms: state.config.default_timeout_ms_wordle,
    };

    let (tx, rx) = crate::race::event_channel();
    let cancel = CancellationToken::new();
    let handle = crate::race::RaceHandle { join: tokio::spawn(wordle::run(config, adapters, tx, cancel.clone())), cancel };
    state.register_race(race_id.clone(), handle.cancel.clone()).await;
    Ok(into_sse(rx, state, race_id))
}

/// `POST /race/:race_id/end_early` (spec §4.5): signals session-level
/// cancellation for a still-running race. 202 if a matching race was found
/// and signaled, 404 if no such race is currently in flight (already
/// completed, errored, or never existed).
#[instrument(skip(state))]
pub async fn end_early(State(state): State<Arc<AppState>>, Path(race_id): Path<String>) -> Response {
    if state.end_early(&race_id).await {
        (axum::http::StatusCode::ACCEPTED, Json(json!({ "race_id": race_id, "status": "ending" }))).into_response()
    } else {
        (axum::http::StatusCode::NOT_FOUND, Json(json!({ "error": "no in-flight race with that id" }))).into_response()
    }
}
