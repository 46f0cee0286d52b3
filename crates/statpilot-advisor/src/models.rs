//! Data models shared by providers and the orchestrator

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::recommendation::Recommendation;

/// The closed set of recommendation sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Remote-hosted OpenAI-compatible API
    Remote,
    /// Locally hosted Ollama instance
    Local,
    /// Deterministic keyword matcher
    Keyword,
}

impl ProviderKind {
    /// Stable identifier used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Remote => "remote",
            ProviderKind::Local => "local",
            ProviderKind::Keyword => "keyword",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// End user
    User,
    /// Model reply
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// System prompt, user prompt and optional prior conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    /// Persona and output-format instructions
    pub system: String,
    /// The question plus data context
    pub user: String,
    /// Earlier turns, oldest first
    pub history: Vec<ChatMessage>,
}

impl Prompt {
    /// Create a prompt without history
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            history: Vec::new(),
        }
    }

    /// Attach prior conversation turns
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Flatten into the message list sent to a backend
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system.clone()));
        messages.extend(
            self.history
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        messages.push(ChatMessage::user(self.user.clone()));
        messages
    }
}

/// Per-call overrides of the provider defaults
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token budget
    pub max_tokens: Option<u32>,
}

impl RequestOptions {
    /// Options with both values set
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// Result of a single-shot provider request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// Parsed recommendation, if any model produced a valid one
    pub recommendation: Option<Recommendation>,
    /// Reply text the recommendation was parsed from
    pub raw_text: String,
    /// Model that answered
    pub model: Option<String>,
}

impl ProviderReply {
    /// Reply used when every model produced unusable output
    pub fn empty() -> Self {
        Self {
            recommendation: None,
            raw_text: String::new(),
            model: None,
        }
    }
}

/// Final answer of a non-streaming recommendation call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationOutcome {
    /// The recommendation; the keyword fallback always provides one
    pub recommendation: Option<Recommendation>,
    /// Text shown to the user alongside the recommendation
    pub response_text: String,
    /// Source that produced the recommendation
    pub provider: ProviderKind,
}

/// Terminal value of a successful stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCompletion {
    /// Model that produced the stream
    pub model: String,
    /// Provider that produced the stream
    pub provider: ProviderKind,
}
