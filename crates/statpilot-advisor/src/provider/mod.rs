//! Provider trait and the model-fallback adapter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{HealthTtls, ProviderConfig};
use crate::error::AdvisorError;
use crate::health_check::HealthMonitor;
use crate::models::{ChatMessage, Prompt, ProviderKind, ProviderReply, RequestOptions};
use crate::providers::{LocalTransport, RemoteTransport};
use crate::recommendation::Recommendation;

pub mod attempt;

pub use attempt::{Attempt, FailureLedger};

/// Callback receiving streamed text deltas in order
pub type ChunkSink<'a> = &'a (dyn Fn(String) + Send + Sync);

/// Remote provider with model fallback
pub type RemoteProvider = ProviderAdapter<RemoteTransport>;
/// Local provider with model fallback
pub type LocalProvider = ProviderAdapter<LocalTransport>;

/// One backend's wire protocol, for a single model at a time
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Which provider this transport talks to
    fn kind(&self) -> ProviderKind;

    /// Connection settings
    fn config(&self) -> &ProviderConfig;

    /// Lightweight reachability and credential check
    async fn probe(&self, timeout: Duration) -> Result<(), AdvisorError>;

    /// Single-shot completion returning the raw reply text
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> Result<String, AdvisorError>;

    /// Streamed completion; every non-empty delta goes to `on_chunk`
    async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
        on_chunk: ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), AdvisorError>;
}

/// A recommendation source as seen by the orchestrator
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider variant
    fn kind(&self) -> ProviderKind;

    /// Identifier used in logs and error messages
    fn id(&self) -> &str {
        self.kind().as_str()
    }

    /// Cached availability check
    async fn check_health(&self) -> bool;

    /// Ask each model in turn for a recommendation
    async fn request_once(
        &self,
        prompt: &Prompt,
        options: &RequestOptions,
    ) -> Result<ProviderReply, AdvisorError>;

    /// Stream from the first model that delivers text; returns that model's id
    async fn request_stream(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
        on_chunk: ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, AdvisorError>;

    /// Ask each model in turn, returning the first non-empty raw reply
    async fn classify_raw_text(
        &self,
        prompt: &Prompt,
        options: &RequestOptions,
    ) -> Result<Option<String>, AdvisorError>;
}

/// Runs the model fallback sweep over a transport and gates it on health
pub struct ProviderAdapter<T: ChatTransport> {
    transport: T,
    health: HealthMonitor,
}

impl<T: ChatTransport> ProviderAdapter<T> {
    /// Wrap `transport` with a fresh health cache
    pub fn new(transport: T, ttls: HealthTtls) -> Self {
        let health = HealthMonitor::new(transport.kind().as_str(), ttls);
        Self { transport, health }
    }

    /// Health cache
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    fn models(&self) -> &[String] {
        &self.transport.config().models
    }

    /// Record a failed attempt; cancellation escapes the sweep
    fn record_failure(
        &self,
        ledger: &mut FailureLedger,
        model: &str,
        err: AdvisorError,
    ) -> Result<(), AdvisorError> {
        if err.is_cancelled() {
            return Err(err);
        }
        match Attempt::<()>::from_error(err) {
            Attempt::Soft(reason) => ledger.soft(model, reason),
            Attempt::Hard(err) => {
                if err.is_credential_rejection() {
                    self.health.mark_rejected();
                }
                ledger.hard(model, &err);
            }
            Attempt::Success(()) => {}
        }
        Ok(())
    }

    /// One streaming attempt against `model`
    async fn stream_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &RequestOptions,
        on_chunk: ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Attempt<()> {
        let delivered = AtomicUsize::new(0);
        let counting = |chunk: String| {
            delivered.fetch_add(1, Ordering::SeqCst);
            on_chunk(chunk);
        };

        let result = self
            .transport
            .stream(model, messages, options, &counting, cancel)
            .await;
        let delivered = delivered.load(Ordering::SeqCst);

        match result {
            Ok(()) if delivered > 0 => Attempt::Success(()),
            Ok(()) => Attempt::Soft("stream completed without content".to_string()),
            Err(_) if cancel.is_cancelled() => Attempt::Hard(AdvisorError::Cancelled),
            Err(e) if e.is_cancelled() => Attempt::Hard(e),
            Err(e) if delivered > 0 => Attempt::Hard(AdvisorError::StreamInterrupted {
                model: model.to_string(),
                delivered,
                reason: e.to_string(),
            }),
            Err(e) => Attempt::from_error(e),
        }
    }
}

#[async_trait]
impl<T: ChatTransport> Provider for ProviderAdapter<T> {
    fn kind(&self) -> ProviderKind {
        self.transport.kind()
    }

    async fn check_health(&self) -> bool {
        let configured = self.transport.config().is_configured();
        self.health
            .check(configured, |timeout| self.transport.probe(timeout))
            .await
    }

    async fn request_once(
        &self,
        prompt: &Prompt,
        options: &RequestOptions,
    ) -> Result<ProviderReply, AdvisorError> {
        let messages = prompt.to_messages();
        let mut ledger = FailureLedger::new(self.id());

        for model in self.models() {
            debug!("Requesting recommendation from {} model {}", self.id(), model);
            let text = match self.transport.complete(model, &messages, options).await {
                Ok(text) => text,
                Err(e) => {
                    self.record_failure(&mut ledger, model, e)?;
                    continue;
                }
            };

            match Recommendation::from_model_output(&text) {
                Some(recommendation) => {
                    info!("Recommendation from {} model {}", self.id(), model);
                    return Ok(ProviderReply {
                        recommendation: Some(recommendation),
                        raw_text: text,
                        model: Some(model.clone()),
                    });
                }
                None => ledger.soft(model, "no valid recommendation payload"),
            }
        }

        ledger.finish(ProviderReply::empty())
    }

    async fn request_stream(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
        on_chunk: ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, AdvisorError> {
        let mut ledger = FailureLedger::new(self.id());

        for model in self.models() {
            if cancel.is_cancelled() {
                return Err(AdvisorError::Cancelled);
            }
            debug!("Streaming from {} model {}", self.id(), model);

            match self
                .stream_model(model, messages, options, on_chunk, cancel)
                .await
            {
                Attempt::Success(()) => {
                    info!("Stream from {} model {} completed", self.id(), model);
                    return Ok(model.clone());
                }
                Attempt::Soft(reason) => ledger.soft(model, reason),
                Attempt::Hard(err) if !err.is_fallback_eligible() => return Err(err),
                Attempt::Hard(err) => self.record_failure(&mut ledger, model, err)?,
            }
        }

        Err(ledger.into_error())
    }

    async fn classify_raw_text(
        &self,
        prompt: &Prompt,
        options: &RequestOptions,
    ) -> Result<Option<String>, AdvisorError> {
        let messages = prompt.to_messages();
        let mut ledger = FailureLedger::new(self.id());

        for model in self.models() {
            debug!("Requesting raw text from {} model {}", self.id(), model);
            match self.transport.complete(model, &messages, options).await {
                Ok(text) if !text.trim().is_empty() => return Ok(Some(text)),
                Ok(_) => ledger.soft(model, "empty reply"),
                Err(e) => self.record_failure(&mut ledger, model, e)?,
            }
        }

        ledger.finish(None)
    }
}
