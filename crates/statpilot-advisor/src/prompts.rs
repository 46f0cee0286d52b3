//! Prompt construction for recommendations, streaming answers and intent
//! classification

use std::fmt::Write as _;

use crate::catalog;
use crate::context::{DataRow, RecommendRequest};
use crate::intent::IntentTrack;
use crate::models::{ChatMessage, Prompt};

/// Sample rows included in the data context
pub const MAX_SAMPLE_ROWS: usize = 5;
/// Prior messages forwarded to the model
pub const MAX_HISTORY_MESSAGES: usize = 10;

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else, using this shape:
{
  "methodId": "<method id>",
  "methodName": "<method name>",
  "confidence": <number between 0 and 1>,
  "reasoning": ["<step>", "..."],
  "assumptions": [{"name": "<assumption>", "passed": <true|false>, "pValue": <number, optional>}],
  "alternatives": [{"id": "<method id>", "name": "<method name>", "description": "<why>"}],
  "variableAssignments": {"dependent": [], "independent": [], "factor": [], "covariate": [], "within": [], "between": []},
  "suggestedSettings": {},
  "warnings": ["<warning>"],
  "dataPreprocessing": ["<step>"],
  "ambiguityNote": "<only if the question can be read more than one way>"
}
Only "methodId" and "methodName" are required. Use only column names that appear in the data context."#;

/// Persona a prompt is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// Validation results are available; reason from the actual data
    Diagnostic,
    /// No validation results; advise from the question alone
    Consultant,
    /// Plain-prose streaming answers
    Conversational,
}

impl Persona {
    /// Persona for a single-shot recommendation
    pub fn for_request(request: &RecommendRequest) -> Self {
        if request.has_validation() {
            Persona::Diagnostic
        } else {
            Persona::Consultant
        }
    }

    fn system_prompt(&self) -> String {
        match self {
            Persona::Diagnostic => format!(
                "You are a statistical diagnostician. The user's dataset has already been \
                 validated and summarized below. Base your recommendation on the measured \
                 column types, distributions, missing values and assumption checks, and say \
                 which findings drove your choice.\n\nKnown method ids: {}\n\n{}",
                catalog::method_ids(),
                RESPONSE_FORMAT
            ),
            Persona::Consultant => format!(
                "You are a statistical consultant helping a researcher choose an analysis. \
                 No dataset has been validated yet, so reason from the research question and \
                 list the assumptions that should be checked once data is available.\n\n\
                 Known method ids: {}\n\n{}",
                catalog::method_ids(),
                RESPONSE_FORMAT
            ),
            Persona::Conversational => "You are a friendly statistics assistant. Answer in \
                 clear, concise prose. Recommend an analysis when the question calls for one, \
                 explain why, and mention assumptions worth checking. Do not answer in JSON."
                .to_string(),
        }
    }
}

/// Prompt for a single-shot structured recommendation
pub fn recommendation_prompt(request: &RecommendRequest) -> Prompt {
    let persona = Persona::for_request(request);
    Prompt::new(persona.system_prompt(), user_prompt(request))
        .with_history(recent_history(&request.chat_history))
}

/// Message list for a streamed prose answer
pub fn streaming_messages(request: &RecommendRequest) -> Vec<ChatMessage> {
    Prompt::new(Persona::Conversational.system_prompt(), user_prompt(request))
        .with_history(recent_history(&request.chat_history))
        .to_messages()
}

/// Prompt asking which workflow a message belongs to
pub fn intent_prompt(user_input: &str) -> Prompt {
    let tracks = IntentTrack::ALL
        .iter()
        .map(|t| format!("- \"{}\": {}", t.as_str(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "Classify the user's message into exactly one track:\n{}\n\n\
         Respond with only a JSON object: {{\"track\": \"<track>\", \"confidence\": <number between 0 and 1>}}",
        tracks
    );
    Prompt::new(system, user_input.trim())
}

/// The last `MAX_HISTORY_MESSAGES` conversation turns
pub fn recent_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    history[start..].to_vec()
}

fn user_prompt(request: &RecommendRequest) -> String {
    let context = data_context(request);
    if context.is_empty() {
        format!("Question: {}", request.user_input.trim())
    } else {
        format!("{}\nQuestion: {}", context, request.user_input.trim())
    }
}

/// Render validation results, sample rows and assumption outcomes
pub fn data_context(request: &RecommendRequest) -> String {
    let mut out = String::new();

    if let Some(validation) = &request.validation {
        let _ = writeln!(
            out,
            "Dataset: {} rows, {} columns",
            validation.total_rows,
            validation.columns.len()
        );
        for column in &validation.columns {
            let _ = write!(
                out,
                "- {} ({:?}): {} missing, {} unique",
                column.name, column.kind, column.missing_count, column.unique_count
            );
            if let (Some(mean), Some(sd)) = (column.mean, column.std_dev) {
                let _ = write!(out, ", mean {:.3}, sd {:.3}", mean, sd);
            }
            if let (Some(min), Some(max)) = (column.min, column.max) {
                let _ = write!(out, ", range [{}, {}]", min, max);
            }
            if !column.top_values.is_empty() {
                let _ = write!(out, ", top values: {}", column.top_values.join(", "));
            }
            out.push('\n');
        }
        for warning in &validation.warnings {
            let _ = writeln!(out, "Validation warning: {}", warning);
        }
    }

    if !request.data.is_empty() {
        let shown = request.data.len().min(MAX_SAMPLE_ROWS);
        let _ = writeln!(out, "Sample rows ({} of {}):", shown, request.data.len());
        for row in request.data.iter().take(MAX_SAMPLE_ROWS) {
            let _ = writeln!(out, "{}", render_row(row));
        }
    }

    if !request.assumptions.is_empty() {
        out.push_str("Assumption checks:\n");
        for assumption in &request.assumptions {
            let verdict = if assumption.passed { "passed" } else { "violated" };
            let _ = write!(out, "- {}: {}", assumption.name, verdict);
            if let Some(p) = assumption.p_value {
                let _ = write!(out, " (p = {:.4})", p);
            }
            if let Some(detail) = &assumption.detail {
                let _ = write!(out, " [{}]", detail);
            }
            out.push('\n');
        }
    }

    out
}

fn render_row(row: &DataRow) -> String {
    serde_json::to_string(row).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AssumptionResult, ColumnKind, ColumnSummary, ValidationSummary};
    use crate::models::Role;
    use serde_json::json;

    fn validation() -> ValidationSummary {
        ValidationSummary {
            total_rows: 120,
            columns: vec![ColumnSummary {
                name: "score".to_string(),
                kind: ColumnKind::Numeric,
                missing_count: 2,
                unique_count: 80,
                mean: Some(71.5),
                std_dev: Some(9.25),
                min: Some(40.0),
                max: Some(99.0),
                top_values: Vec::new(),
            }],
            warnings: vec!["2 missing scores".to_string()],
        }
    }

    #[test]
    fn test_persona_follows_validation_presence() {
        let request = RecommendRequest::new("compare");
        assert_eq!(Persona::for_request(&request), Persona::Consultant);
        let request = request.with_validation(validation());
        assert_eq!(Persona::for_request(&request), Persona::Diagnostic);
    }

    #[test]
    fn test_recommendation_prompt_includes_context() {
        let request = RecommendRequest::new("Does score differ by group?")
            .with_validation(validation())
            .with_assumptions(vec![AssumptionResult {
                name: "normality".to_string(),
                passed: false,
                p_value: Some(0.012),
                detail: None,
            }]);

        let prompt = recommendation_prompt(&request);
        assert!(prompt.system.contains("diagnostician"));
        assert!(prompt.system.contains("one-way-anova"));
        assert!(prompt.user.contains("Dataset: 120 rows"));
        assert!(prompt.user.contains("- score (Numeric)"));
        assert!(prompt.user.contains("normality: violated (p = 0.0120)"));
        assert!(prompt.user.ends_with("Question: Does score differ by group?"));
    }

    #[test]
    fn test_sample_rows_capped() {
        let rows = (0..8)
            .map(|i| json!({"id": i}).as_object().cloned().unwrap())
            .collect();
        let request = RecommendRequest::new("q").with_data(rows);
        let context = data_context(&request);
        assert!(context.contains("Sample rows (5 of 8)"));
        assert!(context.contains("{\"id\":4}"));
        assert!(!context.contains("{\"id\":5}"));
    }

    #[test]
    fn test_history_limited_to_recent_messages() {
        let history: Vec<ChatMessage> = (0..14)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();
        let recent = recent_history(&history);
        assert_eq!(recent.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(recent[0].content, "turn 4");
    }

    #[test]
    fn test_streaming_messages_use_conversational_persona() {
        let request = RecommendRequest::new("What test should I use?")
            .with_history(vec![ChatMessage::assistant("Hi!")]);
        let messages = streaming_messages(&request);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].content.contains("Do not answer in JSON"));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].content, "Question: What test should I use?");
    }

    #[test]
    fn test_intent_prompt_lists_tracks() {
        let prompt = intent_prompt("  I want to plan a study  ");
        assert!(prompt.system.contains("experiment-design"));
        assert!(prompt.system.contains("\"track\""));
        assert_eq!(prompt.user, "I want to plan a study");
    }
}
