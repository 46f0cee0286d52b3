//! Local Ollama transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{check_probe_status, check_status, read_lines, send_cancellable, LineControl};
use crate::config::ProviderConfig;
use crate::error::AdvisorError;
use crate::models::{ChatMessage, ProviderKind, RequestOptions};
use crate::provider::{ChatTransport, ChunkSink};

/// Transport for a local Ollama server
pub struct LocalTransport {
    config: ProviderConfig,
    client: Client,
}

impl LocalTransport {
    /// Create a transport for `config`
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn chat_request<'a>(
        &self,
        model: &'a str,
        messages: &'a [ChatMessage],
        options: &RequestOptions,
        stream: bool,
    ) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model,
            messages,
            stream,
            options: OllamaOptions {
                temperature: options.temperature.unwrap_or(self.config.temperature),
                num_predict: options.max_tokens.unwrap_or(self.config.max_tokens),
            },
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }
}

#[async_trait]
impl ChatTransport for LocalTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn probe(&self, timeout: Duration) -> Result<(), AdvisorError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(timeout)
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
        debug!("Sending local chat request to model {}", model);

        let response = self
            .client
            .post(self.chat_url())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response, model).await?;
        let reply: OllamaChatResponse = response.json().await?;

        if let Some(error) = reply.error {
            return Err(AdvisorError::InvalidResponse(format!("Ollama error: {}", error)));
        }

        Ok(reply.message.map(|m| m.content).unwrap_or_default())
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
        debug!("Opening local stream for model {}", model);

        let request = self
            .client
            .post(self.chat_url())
            .timeout(self.config.stream_timeout())
            .json(&body);
        let response = send_cancellable(request, cancel).await?;
        let response = check_status(response, model).await?;

        read_lines(response, cancel, |line| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(LineControl::Continue);
            }

            let reply: OllamaChatResponse = match serde_json::from_str(line) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!("Skipping unparseable stream line: {}", e);
                    return Ok(LineControl::Continue);
                }
            };
            if let Some(error) = reply.error {
                return Err(AdvisorError::InvalidResponse(format!("Ollama error: {}", error)));
            }

            if let Some(content) = reply.message.map(|m| m.content).filter(|c| !c.is_empty()) {
                on_chunk(content);
            }

            if reply.done {
                Ok(LineControl::Stop)
            } else {
                Ok(LineControl::Continue)
            }
        })
        .await
    }
}

/// Ollama API chat request format
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API chat response format; streaming sends one per line
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}
