//! Illustrative concrete adapter: Anthropic Messages API over SSE.
//!
//! Grounded on the teacher's `ai::llm::anthropic::AnthropicClient` (request
//! construction) and `ai::llm::streaming` (SSE parsing via
//! `eventsource_stream`). This is the only wired vendor in this crate — per
//! §4.2/§9, the engine never depends on it directly, only on
//! [`super::StreamingAdapter`].

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{AdapterError, AdapterStream, Delta, StreamOpts, StreamingAdapter};
use crate::model_spec::{ModelSpec, Thinking};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    model_name: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), model_name: model_name.into() }
    }

    /// Resolve the API key from `ANTHROPIC_API_KEY` the way
    /// `ai::llm::get_api_key` does, rather than embedding it in `ModelSpec`.
    pub fn from_env(model_name: impl Into<String>) -> Result<Self, AdapterError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AdapterError::ProviderError {
            message: "ANTHROPIC_API_KEY not set".to_string(),
            partial_text: None,
        })?;
        Ok(Self::new(api_key, model_name))
    }

    fn build_body(&self, spec: &ModelSpec, prompt: &str, opts: &StreamOpts) -> serde_json::Value {
        let mut body = json!({
            "model": spec.endpoint_ref,
            "max_tokens": opts.max_output_tokens.unwrap_or(16),
            "stream": true,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let obj = body.as_object_mut().expect("body is an object");
        // Anthropic disallows `top_p` together with `temperature` for some
        // model families; prefer `temperature` when both are set.
        if let Some(temp) = spec.temperature {
            obj.insert("temperature".to_string(), json!(temp));
        } else if let Some(top_p) = spec.top_p {
            obj.insert("top_p".to_string(), json!(top_p));
        }
        if let Thinking::On { level } = spec.thinking {
            let budget = match level {
                crate::model_spec::ThinkingLevel::Low => 1024,
                crate::model_spec::ThinkingLevel::Medium => 4096,
                crate::model_spec::ThinkingLevel::High => 16384,
            };
            obj.insert("thinking".to_string(), json!({ "type": "enabled", "budget_tokens": budget }));
        }
        body
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEvent {
    MessageStart { message: RawMessageStart },
    ContentBlockStart { index: usize, content_block: RawContentBlockStart },
    ContentBlockDelta { index: usize, delta: RawContentDelta },
    ContentBlockStop { index: usize },
    MessageDelta { usage: RawUsage },
    MessageStop,
    Ping,
    Error { error: RawApiError },
}

#[derive(Debug, Deserialize)]
struct RawMessageStart {
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawContentBlockStart {
    Text { text: String },
    Thinking { thinking: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawContentDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct RawUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct RawApiError {
    message: String,
}

/// Best-effort partial-text recovery from a validation error body that
/// embeds the partial generation (spec §9 Open Question 3). Returns `None`
/// when the shape doesn't match rather than panicking.
fn recover_partial_text(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.get("partial_text")?.as_str().map(str::to_string)
}

#[async_trait]
impl StreamingAdapter for AnthropicAdapter {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn stream(
        &self,
        spec: &ModelSpec,
        prompt: &str,
        opts: StreamOpts,
        cancel: CancellationToken,
    ) -> Result<AdapterStream, AdapterError> {
        let body = self.build_body(spec, prompt, &opts);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::ProviderError { message: e.to_string(), partial_text: None })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let partial_text = recover_partial_text(&text);
            if status.as_u16() == 429 {
                return Err(AdapterError::RateLimited { retry_after_secs: None });
            }
            return Err(AdapterError::ProviderError {
                message: format!("anthropic error {status}: {text}"),
                partial_text,
            });
        }

        let byte_stream = response.bytes_stream().eventsource();
        let cancel2 = cancel.clone();

        let deltas = byte_stream.filter_map(move |event| {
            let cancel = cancel2.clone();
            async move {
                if cancel.is_cancelled() {
                    return Some(Err(AdapterError::Cancelled));
                }
                let event = match event {
                    Ok(e) => e,
                    Err(e) => {
                        return Some(Err(AdapterError::ProviderError {
                            message: e.to_string(),
                            partial_text: None,
                        }))
                    }
                };
                let raw: RawEvent = match serde_json::from_str(&event.data) {
                    Ok(r) => r,
                    Err(_) => return None,
                };
                match raw {
                    RawEvent::ContentBlockStart { content_block: RawContentBlockStart::Text { text }, .. } => {
                        if text.is_empty() { None } else { Some(Ok(Delta::Text(text))) }
                    }
                    RawEvent::ContentBlockStart { content_block: RawContentBlockStart::Thinking { thinking }, .. } => {
                        if thinking.is_empty() { None } else { Some(Ok(Delta::Reasoning(thinking))) }
                    }
                    RawEvent::ContentBlockDelta { delta: RawContentDelta::TextDelta { text }, .. } => {
                        Some(Ok(Delta::Text(text)))
                    }
                    RawEvent::ContentBlockDelta { delta: RawContentDelta::ThinkingDelta { thinking }, .. } => {
                        Some(Ok(Delta::Reasoning(thinking)))
                    }
                    RawEvent::MessageDelta { usage } => Some(Ok(Delta::Usage {
                        prompt: usage.input_tokens,
                        completion: usage.output_tokens,
                        total: usage.input_tokens + usage.output_tokens,
                    })),
                    RawEvent::MessageStart { message: RawMessageStart { usage: Some(usage) } } => {
                        Some(Ok(Delta::Usage {
                            prompt: usage.input_tokens,
                            completion: usage.output_tokens,
                            total: usage.input_tokens + usage.output_tokens,
                        }))
                    }
                    RawEvent::Error { error } => {
                        Some(Err(AdapterError::ProviderError { message: error.message, partial_text: None }))
                    }
                    _ => None,
                }
            }
        });

        Ok(stream::unfold((Box::pin(deltas), cancel), |(mut s, cancel)| async move {
            if cancel.is_cancelled() {
                return None;
            }
            s.next().await.map(|d| (d, (s, cancel)))
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_partial_text_when_present() {
        let body = r#"{"error":{"partial_text":"par"}}"#;
        assert_eq!(recover_partial_text(body).as_deref(), Some("par"));
    }

    #[test]
    fn partial_text_recovery_is_none_on_mismatched_shape() {
        assert_eq!(recover_partial_text("not json"), None);
        assert_eq!(recover_partial_text(r#"{"error":{"message":"boom"}}"#), None);
    }

    #[test]
    fn build_body_prefers_temperature_over_top_p() {
        let adapter = AnthropicAdapter::new("test-key", "claude-3-haiku");
        let mut spec = ModelSpec::new("m1", "Model", "claude-3-haiku-20240307");
        spec.temperature = Some(0.5);
        spec.top_p = Some(0.9);
        let body = adapter.build_body(&spec, "hi", &StreamOpts::default());
        assert_eq!(body["temperature"], json!(0.5));
        assert!(body.get("top_p").is_none());
    }
}
