//! Recommendation orchestrator
//!
//! Chooses the provider order, drives single-shot, streaming and intent
//! requests across providers, and owns the keyword fallback.

use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::bridge::{self, BridgeReceiver, BridgeSender, StreamItem};
use crate::config::AdvisorConfig;
use crate::context::RecommendRequest;
use crate::error::AdvisorError;
use crate::intent::{intent_options, IntentClassification};
use crate::keyword::keyword_recommendation;
use crate::models::{ProviderKind, RecommendationOutcome, RequestOptions, StreamCompletion};
use crate::prompts;
use crate::provider::{LocalProvider, Provider, RemoteProvider};
use crate::providers::{LocalTransport, RemoteTransport};
use crate::recommendation::Recommendation;

/// Central coordinator for recommendation requests
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    remote: Arc<dyn Provider>,
    local: Arc<dyn Provider>,
    prefer_local: bool,
}

impl RecommendationOrchestrator {
    /// Build both HTTP providers from configuration
    pub fn from_config(config: &AdvisorConfig) -> Self {
        let remote =
            RemoteProvider::new(RemoteTransport::new(config.remote.clone()), config.health);
        let local = LocalProvider::new(LocalTransport::new(config.local.clone()), config.health);
        Self::new(Arc::new(remote), Arc::new(local)).with_prefer_local(config.prefer_local)
    }

    /// Create an orchestrator over two providers, remote first
    pub fn new(remote: Arc<dyn Provider>, local: Arc<dyn Provider>) -> Self {
        Self {
            remote,
            local,
            prefer_local: false,
        }
    }

    /// Try the local provider first
    pub fn with_prefer_local(mut self, prefer_local: bool) -> Self {
        self.prefer_local = prefer_local;
        self
    }

    /// Providers in the order they are tried
    pub fn provider_order(&self) -> [Arc<dyn Provider>; 2] {
        if self.prefer_local {
            [Arc::clone(&self.local), Arc::clone(&self.remote)]
        } else {
            [Arc::clone(&self.remote), Arc::clone(&self.local)]
        }
    }

    /// Recommend a method, falling back to keyword matching. Never fails.
    pub async fn recommend(&self, request: &RecommendRequest) -> RecommendationOutcome {
        let prompt = prompts::recommendation_prompt(request);
        let known_columns = request.known_columns();
        let options = RequestOptions::default();

        for provider in self.provider_order() {
            if !provider.check_health().await {
                info!("Skipping unavailable provider: {}", provider.id());
                continue;
            }

            match provider.request_once(&prompt, &options).await {
                Ok(reply) => match reply.recommendation {
                    Some(mut recommendation) => {
                        recommendation.filter_variable_assignments(&known_columns);
                        debug!(
                            "Provider {} answered with model {:?}: {}",
                            provider.id(),
                            reply.model,
                            reply.raw_text
                        );
                        info!(
                            "Recommendation {} from provider {}",
                            recommendation.method.id,
                            provider.id()
                        );
                        return RecommendationOutcome {
                            response_text: response_text(&recommendation),
                            recommendation: Some(recommendation),
                            provider: provider.kind(),
                        };
                    }
                    None => debug!("Provider {} produced no usable recommendation", provider.id()),
                },
                Err(e) => warn!("Provider {} failed: {}", provider.id(), e),
            }
        }

        info!("All providers exhausted, using keyword fallback");
        let recommendation = keyword_recommendation(&request.user_input);
        RecommendationOutcome {
            response_text: response_text(&recommendation),
            recommendation: Some(recommendation),
            provider: ProviderKind::Keyword,
        }
    }

    /// Stream a prose answer from the first provider that delivers one.
    ///
    /// Spawns one producer task, so it must be called inside a Tokio runtime.
    /// Cancelling `cancel`, or dropping the returned stream, stops the
    /// producer.
    pub fn stream(
        &self,
        request: RecommendRequest,
        cancel: CancellationToken,
    ) -> RecommendationStream {
        let (sender, receiver) = bridge::channel();
        let task_cancel = cancel.child_token();
        let guard = task_cancel.clone().drop_guard();
        let orchestrator = self.clone();

        tokio::spawn(async move {
            match orchestrator.run_stream(&request, &sender, &task_cancel).await {
                Ok(completion) => sender.finish(completion),
                Err(e) => sender.fail(e),
            }
        });

        RecommendationStream {
            receiver,
            cancel,
            guard,
        }
    }

    async fn run_stream(
        &self,
        request: &RecommendRequest,
        sender: &BridgeSender,
        cancel: &CancellationToken,
    ) -> Result<StreamCompletion, AdvisorError> {
        let messages = prompts::streaming_messages(request);
        let options = RequestOptions::default();
        let on_chunk = |chunk: String| sender.push_chunk(chunk);
        let mut failures = Vec::new();

        for provider in self.provider_order() {
            let healthy = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AdvisorError::Cancelled),
                healthy = provider.check_health() => healthy,
            };
            if !healthy {
                info!("Skipping unavailable provider for streaming: {}", provider.id());
                failures.push(format!("{}: unavailable", provider.id()));
                continue;
            }

            match provider
                .request_stream(&messages, &options, &on_chunk, cancel)
                .await
            {
                Ok(model) => {
                    return Ok(StreamCompletion {
                        model,
                        provider: provider.kind(),
                    })
                }
                Err(e) if !e.is_fallback_eligible() => {
                    debug!("Stream from provider {} ended: {}", provider.id(), e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Provider {} failed to stream: {}", provider.id(), e);
                    failures.push(format!("{}: {}", provider.id(), e));
                }
            }
        }

        error!("All providers failed to stream: {}", failures.join("; "));
        Err(AdvisorError::AllProvidersFailed(failures))
    }

    /// Classify which workflow a message belongs to.
    ///
    /// `Ok(None)` means no provider produced a usable classification and the
    /// caller should apply its own heuristic. An error is returned only when
    /// every attempted provider failed without answering.
    pub async fn classify_intent(
        &self,
        user_input: &str,
    ) -> Result<Option<IntentClassification>, AdvisorError> {
        let prompt = prompts::intent_prompt(user_input);
        let options = intent_options();
        let mut failures = Vec::new();
        let mut answered = false;

        for provider in self.provider_order() {
            if !provider.check_health().await {
                debug!("Skipping unavailable provider for intent: {}", provider.id());
                continue;
            }

            match provider.classify_raw_text(&prompt, &options).await {
                Ok(Some(text)) => {
                    answered = true;
                    match IntentClassification::from_model_output(&text) {
                        Some(classification) => {
                            info!(
                                "Intent {} ({:.2}) from provider {}",
                                classification.track.as_str(),
                                classification.confidence,
                                provider.id()
                            );
                            return Ok(Some(classification));
                        }
                        None => debug!("Provider {} returned an unusable intent", provider.id()),
                    }
                }
                Ok(None) => answered = true,
                Err(e) => {
                    warn!("Provider {} failed to classify intent: {}", provider.id(), e);
                    failures.push(format!("{}: {}", provider.id(), e));
                }
            }
        }

        if !answered && !failures.is_empty() {
            error!("Intent classification failed on every provider");
            return Err(AdvisorError::AllProvidersFailed(failures));
        }
        Ok(None)
    }
}

/// Sequential view of one streaming call
pub struct RecommendationStream {
    receiver: BridgeReceiver,
    cancel: CancellationToken,
    guard: DropGuard,
}

impl RecommendationStream {
    /// Next chunk or terminal item; `None` after the terminal item
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.receiver.next().await
    }

    /// Cancel the caller's token, stopping the producer
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Adapt into a `futures::Stream`; dropping it stops the producer
    pub fn into_stream(self) -> impl Stream<Item = StreamItem> + Send + 'static {
        let guard = self.guard;
        futures::stream::unfold((self.receiver, guard), |(mut receiver, guard)| async move {
            let item = receiver.next().await?;
            Some((item, (receiver, guard)))
        })
    }
}

/// Short human-readable summary shown next to a recommendation
fn response_text(recommendation: &Recommendation) -> String {
    let mut text = format!(
        "Recommended analysis: {} (confidence {:.0}%)",
        recommendation.method.name,
        recommendation.confidence * 100.0
    );
    for reason in &recommendation.reasoning {
        text.push_str("\n- ");
        text.push_str(reason);
    }
    if let Some(note) = &recommendation.ambiguity_note {
        text.push_str("\nNote: ");
        text.push_str(note);
    }
    text
}
