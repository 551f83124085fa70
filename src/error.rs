//! Error taxonomy for the race orchestration core.
//!
//! Per-attempt failures (`timeout`, `adapter_failure`, `format_violation`,
//! `cancelled`) never escape a single `Attempt` record — they are represented by
//! [`crate::race::AttemptErrorKind`], not by this type. `RaceError` covers only
//! the two things that can legitimately escape a function boundary: a bad
//! submission before a race starts, and a fatal engine-level fault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaceError {
    /// Malformed submission: bad JSON, unknown model id, empty rounds.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unrecoverable engine state (invariant violation). The race transitions
    /// to `error` and the stream closes.
    #[error("fatal engine error: {0}")]
    Fatal(String),

    /// Failure in the transport layer itself (not a per-attempt adapter error).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RaceError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        RaceError::InvalidRequest(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        RaceError::Fatal(msg.into())
    }

    /// Whether this error should be surfaced as an HTTP 4xx before any race
    /// starts, vs. an in-stream terminal `error` event.
    pub fn is_pre_race(&self) -> bool {
        matches!(self, RaceError::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, RaceError>;
