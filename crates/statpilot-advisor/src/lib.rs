//! StatPilot advisor - statistical method recommendations from LLM providers
//!
//! Turns a free-text research question plus aggregated dataset statistics into
//! a structured recommendation. Remote (OpenAI-compatible) and local (Ollama)
//! providers are tried in a configurable order, each with its own model
//! fallback list and cached health check; a deterministic keyword matcher is
//! the last resort for single-shot requests. Streaming answers are delivered
//! through a push-to-pull bridge.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod health_check;
pub mod intent;
pub mod json_extract;
pub mod keyword;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod providers;
pub mod recommendation;
pub mod sanitize;

// Re-export commonly used types
pub use bridge::{BridgeReceiver, BridgeSender, StreamItem};
pub use catalog::{MethodCategory, MethodSpec};
pub use config::{AdvisorConfig, HealthTtls, ProviderConfig};
pub use context::{
    AssumptionResult, ColumnKind, ColumnSummary, DataRow, RecommendRequest, ValidationSummary,
};
pub use error::AdvisorError;
pub use health_check::{HealthEntry, HealthMonitor, HealthStatus};
pub use intent::{IntentClassification, IntentTrack};
pub use json_extract::extract_json_object;
pub use keyword::keyword_recommendation;
pub use models::{
    ChatMessage, Prompt, ProviderKind, ProviderReply, RecommendationOutcome, RequestOptions, Role,
    StreamCompletion,
};
pub use orchestrator::{RecommendationOrchestrator, RecommendationStream};
pub use provider::{
    ChatTransport, ChunkSink, FailureLedger, LocalProvider, Provider, ProviderAdapter,
    RemoteProvider,
};
pub use providers::{LocalTransport, RemoteTransport};
pub use recommendation::{AssumptionCheck, MethodInfo, Recommendation, VariableAssignments};
pub use sanitize::strip_thinking;
