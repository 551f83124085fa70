//! Deterministic test adapter, grounded on the teacher's
//! `DeterministicLLMClient`/`MockResponseBuilder` pattern: canned responses
//! with configurable latency, used to drive every engine/runner test without
//! network access.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::{AdapterError, AdapterStream, Delta, StreamOpts, StreamingAdapter};
use crate::model_spec::ModelSpec;

enum Step {
    Reasoning(String),
    Text(String),
    Usage { prompt: u64, completion: u64, total: u64 },
}

#[derive(Clone)]
pub struct MockAdapter {
    model_name: String,
    response_text: String,
    reasoning_text: Option<String>,
    initial_delay: Duration,
    chunk_delay: Duration,
    usage: Option<(u64, u64, u64)>,
    fail_after_reasoning: Option<AdapterError>,
    hang: bool,
}

impl MockAdapter {
    pub fn new(model_name: impl Into<String>, response_text: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            response_text: response_text.into(),
            reasoning_text: None,
            initial_delay: Duration::from_millis(0),
            chunk_delay: Duration::from_millis(0),
            usage: None,
            fail_after_reasoning: None,
            hang: false,
        }
    }

    pub fn with_latency(mut self, d: Duration) -> Self {
        self.initial_delay = d;
        self
    }

    pub fn with_chunk_delay(mut self, d: Duration) -> Self {
        self.chunk_delay = d;
        self
    }

    pub fn with_reasoning(mut self, text: impl Into<String>) -> Self {
        self.reasoning_text = Some(text.into());
        self
    }

    pub fn with_usage(mut self, prompt: u64, completion: u64, total: u64) -> Self {
        self.usage = Some((prompt, completion, total));
        self
    }

    /// Stream reasoning (if any), then error out before any text delta —
    /// simulates a provider failure with no recoverable partial text.
    pub fn failing(mut self, err: AdapterError) -> Self {
        self.fail_after_reasoning = Some(err);
        self
    }

    /// Never completes; only a per-attempt timeout or cancellation ends it.
    /// Used to exercise Scenario D (timeout with partial-text preservation).
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    fn chunks(&self) -> Vec<Step> {
        let mut steps = Vec::new();
        if let Some(r) = &self.reasoning_text {
            steps.push(Step::Reasoning(r.clone()));
        }
        if let Some(err) = &self.fail_after_reasoning {
            // encoded as a sentinel handled in `stream`
            let _ = err;
            return steps;
        }
        let words: Vec<&str> = self.response_text.split(' ').collect();
        for (i, w) in words.iter().enumerate() {
            let chunk = if i + 1 < words.len() { format!("{w} ") } else { (*w).to_string() };
            steps.push(Step::Text(chunk));
        }
        if let Some((prompt, completion, total)) = self.usage {
            steps.push(Step::Usage { prompt, completion, total });
        }
        steps
    }
}

#[async_trait]
impl StreamingAdapter for MockAdapter {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn stream(
        &self,
        _spec: &ModelSpec,
        _prompt: &str,
        _opts: StreamOpts,
        cancel: CancellationToken,
    ) -> Result<AdapterStream, AdapterError> {
        let steps = self.chunks();
        let initial_delay = self.initial_delay;
        let chunk_delay = self.chunk_delay;
        let fail = self.fail_after_reasoning.clone();
        let hang = self.hang;

        let s = stream::unfold((steps.into_iter(), true, cancel), move |(mut iter, first, cancel)| {
            let fail = fail.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let delay = if first { initial_delay } else { chunk_delay };
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return None,
                }
                if hang && iter.len() == 0 {
                    // Hold forever until cancelled (timeout or session end).
                    cancel.cancelled().await;
                    return None;
                }
                match iter.next() {
                    Some(Step::Reasoning(r)) => Some((Ok(Delta::Reasoning(r)), (iter, false, cancel))),
                    Some(Step::Text(t)) => Some((Ok(Delta::Text(t)), (iter, false, cancel))),
                    Some(Step::Usage { prompt, completion, total }) => {
                        Some((Ok(Delta::Usage { prompt, completion, total }), (iter, false, cancel)))
                    }
                    None => match fail {
                        Some(err) => Some((Err(err), (iter, false, cancel))),
                        None => None,
                    },
                }
            }
        });

        Ok(s.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn spec() -> ModelSpec {
        ModelSpec::new("m1", "Mock Model", "mock:m1")
    }

    #[tokio::test]
    async fn yields_text_deltas_that_concatenate_to_full_output() {
        let adapter = MockAdapter::new("m1", "paris");
        let cancel = CancellationToken::new();
        let mut s = adapter.stream(&spec(), "prompt", StreamOpts::default(), cancel).await.unwrap();
        let mut acc = String::new();
        while let Some(Ok(Delta::Text(t))) = s.next().await {
            acc.push_str(&t);
        }
        assert_eq!(acc, "paris");
    }

    #[tokio::test]
    async fn reasoning_precedes_text() {
        let adapter = MockAdapter::new("m1", "paris").with_reasoning("thinking...");
        let cancel = CancellationToken::new();
        let mut s = adapter.stream(&spec(), "prompt", StreamOpts::default(), cancel).await.unwrap();
        let first = s.next().await.unwrap().unwrap();
        assert!(matches!(first, Delta::Reasoning(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_the_stream_promptly() {
        let adapter = MockAdapter::new("m1", "paris").hanging();
        let cancel = CancellationToken::new();
        let mut s = adapter
            .stream(&spec(), "prompt", StreamOpts::default(), cancel.clone())
            .await
            .unwrap();
        cancel.cancel();
        assert!(s.next().await.is_none());
    }
}
