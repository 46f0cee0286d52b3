//! Dataset context supplied by callers
//!
//! The advisor never sees a full dataset. Callers hand it the aggregated
//! output of dataset validation, optional assumption-test outcomes, a few
//! sample rows and the conversation so far.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::ChatMessage;

/// One data row, keyed by column name
pub type DataRow = Map<String, Value>;

/// Measurement level of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Ordinal,
    Binary,
    Text,
    Date,
}

/// Aggregated statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    /// Column name as it appears in the data
    pub name: String,
    /// Measurement level
    pub kind: ColumnKind,
    #[serde(default)]
    pub missing_count: usize,
    #[serde(default)]
    pub unique_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Most frequent values, most frequent first
    #[serde(default)]
    pub top_values: Vec<String>,
}

/// Output of the dataset validation step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_rows: usize,
    #[serde(default)]
    pub columns: Vec<ColumnSummary>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Outcome of one assumption test run by the statistics engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumptionResult {
    /// Assumption name (e.g. "normality of residuals")
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Free-form detail such as the test used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything needed to ask for a recommendation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendRequest {
    /// The user's question
    pub user_input: String,
    pub validation: Option<ValidationSummary>,
    pub assumptions: Vec<AssumptionResult>,
    pub data: Vec<DataRow>,
    /// Prior turns, oldest first
    pub chat_history: Vec<ChatMessage>,
}

impl RecommendRequest {
    /// Request carrying only a question
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    /// Attach validation results
    pub fn with_validation(mut self, validation: ValidationSummary) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Attach assumption-test outcomes
    pub fn with_assumptions(mut self, assumptions: Vec<AssumptionResult>) -> Self {
        self.assumptions = assumptions;
        self
    }

    /// Attach data rows
    pub fn with_data(mut self, data: Vec<DataRow>) -> Self {
        self.data = data;
        self
    }

    /// Attach prior conversation
    pub fn with_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.chat_history = chat_history;
        self
    }

    /// Whether validation results are available
    pub fn has_validation(&self) -> bool {
        self.validation.is_some()
    }

    /// Every column name the caller told us about
    pub fn known_columns(&self) -> HashSet<String> {
        let mut columns: HashSet<String> = self
            .validation
            .iter()
            .flat_map(|v| v.columns.iter().map(|c| c.name.clone()))
            .collect();
        for row in &self.data {
            columns.extend(row.keys().cloned());
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> DataRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_known_columns_union() {
        let validation: ValidationSummary = serde_json::from_value(json!({
            "totalRows": 2,
            "columns": [
                {"name": "age", "kind": "numeric", "missingCount": 0, "uniqueCount": 2},
                {"name": "group", "kind": "categorical"}
            ]
        }))
        .unwrap();

        let request = RecommendRequest::new("compare groups")
            .with_validation(validation)
            .with_data(vec![row(json!({"age": 30, "income": 5000}))]);

        let columns = request.known_columns();
        let mut names: Vec<_> = columns.into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["age", "group", "income"]);
    }

    #[test]
    fn test_empty_request_has_no_columns() {
        let request = RecommendRequest::new("hello");
        assert!(request.known_columns().is_empty());
        assert!(!request.has_validation());
    }

    #[test]
    fn test_assumption_result_deserializes_camel_case() {
        let result: AssumptionResult =
            serde_json::from_value(json!({"name": "normality", "passed": false, "pValue": 0.01}))
                .unwrap();
        assert_eq!(result.p_value, Some(0.01));
        assert!(result.detail.is_none());
    }
}
