//! Remote OpenAI-compatible chat completions transport
//!
//! Works against any endpoint speaking the OpenAI chat-completions dialect
//! (OpenRouter, OpenAI, vLLM, LM Studio).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::decoder::{parse_sse_line, SseLine};
use super::{check_probe_status, check_status, read_lines, send_cancellable, LineControl};
use crate::config::ProviderConfig;
use crate::error::AdvisorError;
use crate::models::{ChatMessage, ProviderKind, RequestOptions};
use crate::provider::{ChatTransport, ChunkSink};

/// Transport for the remote provider
pub struct RemoteTransport {
    config: ProviderConfig,
    client: Client,
}

impl RemoteTransport {
    /// Create a transport for `config`
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Attach the bearer credential, when one is configured
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn chat_request<'a>(
        &self,
        model: &'a str,
        messages: &'a [ChatMessage],
        options: &RequestOptions,
        stream: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model,
            messages,
            temperature: options.temperature.unwrap_or(self.config.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            stream: stream.then_some(true),
        }
    }

    fn post(&self, body: &ChatCompletionRequest<'_>, timeout: Duration) -> RequestBuilder {
        self.authorize(
            self.client
                .post(format!("{}/chat/completions", self.config.base_url))
                .timeout(timeout)
                .json(body),
        )
    }
}

#[async_trait]
impl ChatTransport for RemoteTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn probe(&self, timeout: Duration) -> Result<(), AdvisorError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/models", self.config.base_url))
                    .timeout(timeout),
            )
            .send()
            .await?;
        check_probe_status(&response)
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> Result<String, AdvisorError> {
        let body = self.chat_request(model, messages, options, false);
        debug!("Sending remote chat request to model {}", model);

        let response = self.post(&body, self.config.timeout).send().await?;
        let response = check_status(response, model).await?;
        let completion: ChatCompletionResponse = response.json().await?;

        if let Some(served_by) = completion.model.as_deref() {
            debug!("Remote response served by model {}", served_by);
        }

        Ok(completion.into_text())
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
        on_chunk: ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), AdvisorError> {
        let body = self.chat_request(model, messages, options, true);
        debug!("Opening remote stream for model {}", model);

        let request = self.post(&body, self.config.stream_timeout());
        let response = send_cancellable(request, cancel).await?;
        let response = check_status(response, model).await?;

        read_lines(response, cancel, |line| match parse_sse_line(line) {
            SseLine::Done => Ok(LineControl::Stop),
            SseLine::Ignored => Ok(LineControl::Continue),
            SseLine::Data(data) => {
                let event = match serde_json::from_str::<StreamEvent>(data) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("Skipping unparseable stream event: {}", e);
                        return Ok(LineControl::Continue);
                    }
                };
                if let Some(error) = event.error {
                    return Err(AdvisorError::InvalidResponse(format!(
                        "Stream error event: {}",
                        error
                    )));
                }
                if let Some(content) = event.into_content() {
                    on_chunk(content);
                }
                Ok(LineControl::Continue)
            }
        })
        .await
    }
}

/// Chat completions request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Message content, or the reasoning channel when content is empty
    fn into_text(self) -> String {
        let Some(message) = self.choices.into_iter().next().and_then(|c| c.message) else {
            return String::new();
        };
        match message.content.filter(|c| !c.trim().is_empty()) {
            Some(content) => content,
            None => message.reasoning_content.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// One `data:` event of a streamed completion
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl StreamEvent {
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_config_defaults() {
        let config = ProviderConfig::remote("https://example.com/v1", Some("k".to_string()), vec![])
            .with_temperature(0.2)
            .with_max_tokens(512);
        let transport = RemoteTransport::new(config);
        let messages = vec![ChatMessage::user("hi")];

        let body = transport.chat_request("m", &messages, &RequestOptions::default(), false);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("stream").is_none());
        assert_eq!(json["messages"][0]["role"], "user");

        let body = transport.chat_request("m", &messages, &RequestOptions::new(0.1, 150), true);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_reasoning_content_fallback() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"model":"m","choices":[{"message":{"role":"assistant","content":"","reasoning_content":"{\"a\":1}"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text(), "{\"a\":1}");

        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hello"}}]}"#).unwrap();
        assert_eq!(response.into_text(), "hello");

        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(response.into_text(), "");
    }

    #[test]
    fn test_stream_event_content() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap();
        assert_eq!(event.into_content(), Some("Hel".to_string()));

        let event: StreamEvent =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(event.into_content(), None);
    }
}
