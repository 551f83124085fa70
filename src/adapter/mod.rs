//! Adapter contract (C3, spec §4.2).
//!
//! An adapter is a capability, not a concrete provider: prompt in, a lazy
//! finite sequence of `{reasoning, text, usage}` deltas out. The engine (C5)
//! and runner (C4) never know which vendor backs a given [`ModelSpec`] — only
//! that it implements [`StreamingAdapter`]. Wiring to specific vendor SDKs is
//! explicitly non-core; [`anthropic`] is kept as a single illustrative
//! concrete implementation, [`mock`] is what drives every test in this crate.

pub mod anthropic;
pub mod mock;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model_spec::ModelSpec;

/// One chunk of a streaming response. Text deltas, concatenated in order,
/// equal the final model output. Reasoning deltas are opaque side-channel
/// data. Usage appears at most once, typically last.
#[derive(Debug, Clone)]
pub enum Delta {
    Reasoning(String),
    Text(String),
    Usage { prompt: u64, completion: u64, total: u64 },
}

/// Errors an adapter invocation can terminate with (classified per §7).
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("request timed out")]
    Timeout,

    /// A provider-side failure. `partial_text`, when present, is text
    /// recovered from a vendor error shape that embeds a partial generation
    /// (spec §9 Open Question 3) — best-effort, never mandatory.
    #[error("provider error: {message}")]
    ProviderError { message: String, partial_text: Option<String> },

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct StreamOpts {
    pub max_output_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

pub type DeltaResult = Result<Delta, AdapterError>;
pub type AdapterStream = BoxStream<'static, DeltaResult>;

/// Inputs: `ModelSpec`, prompt, optional knobs, cancellation signal. Output:
/// a lazy finite delta stream. Implementations must respect cancellation
/// promptly once `cancel` is triggered.
#[async_trait]
pub trait StreamingAdapter: Send + Sync {
    fn model_name(&self) -> &str;

    async fn stream(
        &self,
        spec: &ModelSpec,
        prompt: &str,
        opts: StreamOpts,
        cancel: CancellationToken,
    ) -> Result<AdapterStream, AdapterError>;
}
