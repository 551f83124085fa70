//! Attempt Runner (C4, spec §4.3): drives one (model, prompt) pair through
//! one adapter invocation. Never throws — always returns a fully-populated
//! [`Attempt`].

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterError, Delta, StreamOpts, StreamingAdapter};
use crate::model_spec::ModelSpec;
use crate::normalize::{self, CaseRule, OutputRule};
use crate::race::{Attempt, AttemptErrorKind, TokenUsage};

/// A sink for progress observable mid-attempt (reasoning deltas, partial
/// text). The runner forwards to it; C6 implementations wire it to the event
/// channel. A no-op implementation is used where no one is listening.
pub trait ProgressSink: Send {
    fn on_reasoning_delta(&mut self, _delta: &str) {}
    fn on_text_delta(&mut self, _delta: &str) {}
}

pub struct NullProgressSink;
impl ProgressSink for NullProgressSink {}

/// Forwards reasoning deltas to the event channel, diffed through a
/// [`crate::race::events::ReasoningDiffTracker`] per §4.7's suffix-sending
/// contract. Fresh per attempt, so no stale state leaks across races.
pub struct ChannelProgressSink {
    model_id: String,
    guess_index: Option<u8>,
    events: tokio::sync::mpsc::UnboundedSender<crate::race::RaceEvent>,
    reasoning_acc: String,
    tracker: crate::race::events::ReasoningDiffTracker,
}

impl ChannelProgressSink {
    pub fn new(model_id: impl Into<String>, guess_index: Option<u8>, events: tokio::sync::mpsc::UnboundedSender<crate::race::RaceEvent>) -> Self {
        Self {
            model_id: model_id.into(),
            guess_index,
            events,
            reasoning_acc: String::new(),
            tracker: crate::race::events::ReasoningDiffTracker::new(),
        }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_reasoning_delta(&mut self, delta: &str) {
        self.reasoning_acc.push_str(delta);
        if let Some(suffix) = self.tracker.diff(&self.model_id, self.guess_index, &self.reasoning_acc) {
            let _ = self.events.send(crate::race::RaceEvent::ReasoningDelta {
                model_id: self.model_id.clone(),
                guess_index: self.guess_index,
                delta: suffix,
            });
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptOptions {
    pub clue_length: Option<usize>,
    pub output_rule: OutputRule,
    pub case_rule: CaseRule,
    pub allow_hyphen: bool,
    pub canonical_answer: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub timeout_ms: u64,
}

impl AttemptOptions {
    pub fn crossword(clue_length: usize, output_rule: OutputRule, case_rule: CaseRule, allow_hyphen: bool, canonical_answer: String, max_output_tokens: u32, timeout_ms: u64) -> Self {
        Self {
            clue_length: Some(clue_length),
            output_rule,
            case_rule,
            allow_hyphen,
            canonical_answer: Some(canonical_answer),
            max_output_tokens: Some(max_output_tokens),
            timeout_ms,
        }
    }

    pub fn wordle_guess(max_output_tokens: u32, timeout_ms: u64) -> Self {
        Self {
            clue_length: None,
            output_rule: OutputRule::Plain,
            case_rule: CaseRule::Lower,
            allow_hyphen: false,
            canonical_answer: None,
            max_output_tokens: Some(max_output_tokens),
            timeout_ms,
        }
    }
}

/// Run one attempt end-to-end. `session_cancel` is the session-level
/// cancellation source (client disconnect / `end_early`); a child token is
/// derived so per-attempt timeout cancellation never affects siblings.
pub async fn run_attempt(
    model: &ModelSpec,
    clue_id: Option<&str>,
    prompt: &str,
    opts: &AttemptOptions,
    adapter: &dyn StreamingAdapter,
    progress: &mut dyn ProgressSink,
    session_cancel: &CancellationToken,
    race_start: Instant,
) -> Attempt {
    let t_request = Instant::now();
    let attempt_cancel = session_cancel.child_token();

    let mut text = String::new();
    let mut t_first: Option<Instant> = None;
    let mut token_usage: Option<TokenUsage> = None;
    let mut error: Option<AttemptErrorKind> = None;

    let stream_opts = StreamOpts { max_output_tokens: opts.max_output_tokens, timeout_ms: Some(opts.timeout_ms) };

    let stream_result = adapter.stream(model, prompt, stream_opts, attempt_cancel.clone()).await;

    match stream_result {
        Err(e) => error = Some(classify_adapter_error(&e, &mut text)),
        Ok(mut stream) => {
            let deadline = tokio::time::sleep(Duration::from_millis(opts.timeout_ms));
            tokio::pin!(deadline);
            let mut timed_out = false;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut deadline => {
                        timed_out = true;
                        attempt_cancel.cancel();
                        break;
                    }
                    _ = session_cancel.cancelled() => {
                        attempt_cancel.cancel();
                        break;
                    }
                    next = stream.next() => {
                        match next {
                            Some(Ok(Delta::Reasoning(r))) => progress.on_reasoning_delta(&r),
                            Some(Ok(Delta::Text(t))) => {
                                if t_first.is_none() {
                                    t_first = Some(Instant::now());
                                }
                                progress.on_text_delta(&t);
                                text.push_str(&t);
                            }
                            Some(Ok(Delta::Usage { prompt, completion, total })) => {
                                token_usage = Some(TokenUsage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: total });
                            }
                            Some(Err(e)) => {
                                error = Some(classify_adapter_error(&e, &mut text));
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            if timed_out {
                error = Some(AttemptErrorKind::Timeout);
            } else if session_cancel.is_cancelled() && error.is_none() {
                error = Some(AttemptErrorKind::Cancelled);
            }
        }
    }

    let t_last = Instant::now();
    let e2e_ms = t_last.saturating_duration_since(t_request).as_millis() as u64;
    let ttft_ms = t_first.map(|tf| tf.saturating_duration_since(t_request).as_millis() as u64);
    let t_request_ms = t_request.saturating_duration_since(race_start).as_millis() as u64;
    let t_first_ms = t_first.map(|tf| tf.saturating_duration_since(race_start).as_millis() as u64);
    let t_last_ms = t_last.saturating_duration_since(race_start).as_millis() as u64;

    let normalized = normalize::normalize(&text, opts.output_rule, opts.case_rule, opts.allow_hyphen);
    let (format_ok, correct) = if error.is_some() {
        (false, false)
    } else if let Some(len) = opts.clue_length {
        let format_ok = normalize::format_ok(&text, &normalized, len, opts.output_rule);
        let correct = format_ok
            && opts
                .canonical_answer
                .as_ref()
                .map(|a| normalize::is_correct(&normalized, a, opts.case_rule))
                .unwrap_or(false);
        (format_ok, correct)
    } else {
        (true, false)
    };

    Attempt {
        model_id: model.id.clone(),
        clue_id: clue_id.map(str::to_string),
        t_request_ms,
        t_first_ms,
        t_last_ms,
        e2e_ms,
        ttft_ms,
        output: text,
        normalized,
        format_ok,
        correct,
        clue_score: 0.0,
        token_usage,
        error,
    }
}

/// Maps an [`AdapterError`] to an [`AttemptErrorKind`], recovering whatever
/// partial text the adapter preserved (spec §9 Open Question 3).
fn classify_adapter_error(e: &AdapterError, text: &mut String) -> AttemptErrorKind {
    match e {
        AdapterError::Timeout => AttemptErrorKind::Timeout,
        AdapterError::Cancelled => AttemptErrorKind::Cancelled,
        AdapterError::RateLimited { .. } => AttemptErrorKind::AdapterFailure("rate limited".to_string()),
        AdapterError::ProviderError { message, partial_text } => {
            if let Some(partial) = partial_text {
                if text.is_empty() {
                    text.push_str(partial);
                }
            }
            AttemptErrorKind::AdapterFailure(message.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;

    fn spec() -> ModelSpec {
        ModelSpec::new("m1", "Model One", "mock:m1")
    }

    #[tokio::test]
    async fn successful_crossword_attempt_is_scored_correct() {
        let adapter = MockAdapter::new("m1", r#"{"answer":"paris"}"#);
        let opts = AttemptOptions::crossword(5, OutputRule::Json, CaseRule::Lower, false, "paris".to_string(), 16, 4000);
        let cancel = CancellationToken::new();
        let attempt = run_attempt(&spec(), Some("clue-1"), "clue", &opts, &adapter, &mut NullProgressSink, &cancel, Instant::now()).await;
        assert!(attempt.format_ok);
        assert!(attempt.correct);
        assert!(attempt.error.is_none());
        assert_eq!(attempt.normalized, "paris");
    }

    #[tokio::test]
    async fn wrong_answer_is_format_ok_but_not_correct() {
        let adapter = MockAdapter::new("m1", r#"{"answer":"london"}"#);
        let opts = AttemptOptions::crossword(5, OutputRule::Json, CaseRule::Lower, false, "paris".to_string(), 16, 4000);
        let cancel = CancellationToken::new();
        let attempt = run_attempt(&spec(), Some("clue-1"), "clue", &opts, &adapter, &mut NullProgressSink, &cancel, Instant::now()).await;
        assert!(attempt.format_ok);
        assert!(!attempt.correct);
    }

    #[tokio::test]
    async fn timeout_preserves_partial_text() {
        let adapter = MockAdapter::new("m1", "app").hanging();
        let opts = AttemptOptions::wordle_guess(10, 30);
        let cancel = CancellationToken::new();
        let attempt = run_attempt(&spec(), None, "prompt", &opts, &adapter, &mut NullProgressSink, &cancel, Instant::now()).await;
        assert_eq!(attempt.error, Some(AttemptErrorKind::Timeout));
        assert!(!attempt.format_ok);
        assert!(!attempt.correct);
    }

    #[tokio::test]
    async fn runner_never_panics_on_adapter_failure() {
        let adapter = MockAdapter::new("m1", "").failing(AdapterError::ProviderError {
            message: "boom".to_string(),
            partial_text: Some("pa".to_string()),
        });
        let opts = AttemptOptions::crossword(5, OutputRule::Json, CaseRule::Lower, false, "paris".to_string(), 16, 4000);
        let cancel = CancellationToken::new();
        let attempt = run_attempt(&spec(), Some("clue-1"), "clue", &opts, &adapter, &mut NullProgressSink, &cancel, Instant::now()).await;
        assert!(matches!(attempt.error, Some(AttemptErrorKind::AdapterFailure(_))));
        assert_eq!(attempt.output, "pa");
        assert!(!attempt.correct);
    }

    #[tokio::test]
    async fn invariant_t_request_le_t_first_le_t_last() {
        let adapter = MockAdapter::new("m1", r#"{"answer":"paris"}"#).with_latency(Duration::from_millis(5));
        let opts = AttemptOptions::crossword(5, OutputRule::Json, CaseRule::Lower, false, "paris".to_string(), 16, 4000);
        let cancel = CancellationToken::new();
        let attempt = run_attempt(&spec(), Some("clue-1"), "clue", &opts, &adapter, &mut NullProgressSink, &cancel, Instant::now()).await;
        assert!(attempt.t_request_ms <= attempt.t_first_ms.unwrap());
        assert!(attempt.t_first_ms.unwrap() <= attempt.t_last_ms);
        assert_eq!(attempt.e2e_ms, attempt.t_last_ms - attempt.t_request_ms);
    }
}
