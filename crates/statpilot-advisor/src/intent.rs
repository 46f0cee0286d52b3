//! Intent classification of a user's opening message

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::json_extract::extract_json_object;
use crate::models::RequestOptions;
use crate::sanitize::strip_thinking;

/// Temperature for classification requests
pub const INTENT_TEMPERATURE: f32 = 0.1;
/// Token budget for classification requests
pub const INTENT_MAX_TOKENS: u32 = 150;
/// Confidence used when the model omits one
const DEFAULT_INTENT_CONFIDENCE: f64 = 0.5;

/// Workflow a user message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentTrack {
    /// User has data and wants to run an analysis
    DirectAnalysis,
    /// User wants advice about their data or question
    DataConsultation,
    /// User is planning a study
    ExperimentDesign,
}

impl IntentTrack {
    /// Every track, in prompt order
    pub const ALL: [IntentTrack; 3] = [
        IntentTrack::DirectAnalysis,
        IntentTrack::DataConsultation,
        IntentTrack::ExperimentDesign,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentTrack::DirectAnalysis => "direct-analysis",
            IntentTrack::DataConsultation => "data-consultation",
            IntentTrack::ExperimentDesign => "experiment-design",
        }
    }

    /// Description shown to the model
    pub fn description(&self) -> &'static str {
        match self {
            IntentTrack::DirectAnalysis => "the user has data and wants a specific analysis run",
            IntentTrack::DataConsultation => {
                "the user wants advice on which analysis suits their data or question"
            }
            IntentTrack::ExperimentDesign => {
                "the user is planning a study, sample size or experimental design"
            }
        }
    }

    /// Parse a wire name (case-insensitive, `_` accepted for `-`)
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

/// Classified intent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentClassification {
    pub track: IntentTrack,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl IntentClassification {
    /// Parse raw model output; `None` when it names no known track
    pub fn from_model_output(text: &str) -> Option<Self> {
        let cleaned = strip_thinking(text);
        let json = extract_json_object(&cleaned)?;
        let payload: IntentPayload = match serde_json::from_str(json) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Intent payload rejected: {}", e);
                return None;
            }
        };

        let track = IntentTrack::parse(payload.track.as_deref()?)?;
        let confidence = payload
            .confidence
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_INTENT_CONFIDENCE);

        Some(Self { track, confidence })
    }
}

/// Options for classification requests
pub fn intent_options() -> RequestOptions {
    RequestOptions::new(INTENT_TEMPERATURE, INTENT_MAX_TOKENS)
}

#[derive(Debug, Deserialize)]
struct IntentPayload {
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_output() {
        let result = IntentClassification::from_model_output(
            "<think>hmm</think>```json\n{\"track\": \"experiment-design\", \"confidence\": 0.92}\n```",
        )
        .unwrap();
        assert_eq!(result.track, IntentTrack::ExperimentDesign);
        assert_eq!(result.confidence, 0.92);
    }

    #[test]
    fn test_unknown_track_rejected() {
        assert!(
            IntentClassification::from_model_output(r#"{"track":"chit-chat","confidence":0.9}"#)
                .is_none()
        );
        assert!(IntentClassification::from_model_output(r#"{"confidence":0.9}"#).is_none());
        assert!(IntentClassification::from_model_output("direct-analysis").is_none());
    }

    #[test]
    fn test_confidence_defaults_and_clamps() {
        let result =
            IntentClassification::from_model_output(r#"{"track":"DATA_CONSULTATION"}"#).unwrap();
        assert_eq!(result.track, IntentTrack::DataConsultation);
        assert_eq!(result.confidence, DEFAULT_INTENT_CONFIDENCE);

        let result = IntentClassification::from_model_output(
            r#"{"track":"direct-analysis","confidence":4}"#,
        )
        .unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_intent_options() {
        let options = intent_options();
        assert_eq!(options.temperature, Some(0.1));
        assert_eq!(options.max_tokens, Some(150));
    }
}
