//! Router assembly and process bind/serve (spec §6.2).
//!
//! Grounded on `qontinui-supervisor`'s tower-http stack: `CatchPanicLayer` so
//! one adapter task panicking never takes the whole process down,
//! `TraceLayer` for per-request spans, `CorsLayer` permissive since this is a
//! local benchmarking tool, not a multi-tenant service.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::post;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes::{end_early, race_stream, wordle_stream};
use super::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/race/stream", post(race_stream))
        .route("/wordle/stream", post(wordle_stream))
        .route("/race/{race_id}/end_early", post(end_early))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `state.config.bind_addr` and serves until the process is killed.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr.clone();
    let router = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "raceword listening");
    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
