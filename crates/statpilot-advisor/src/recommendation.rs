//! Structured recommendation and the parser for model payloads

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::catalog::{self, MethodCategory, MethodSpec};
use crate::json_extract::extract_json_object;
use crate::sanitize::strip_thinking;

/// Confidence used when the model omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// A statistical method reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodInfo {
    /// Catalog identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// One-line description
    pub description: String,
    /// Method family
    pub category: MethodCategory,
}

impl MethodInfo {
    /// Build from a catalog entry
    pub fn from_spec(spec: &MethodSpec) -> Self {
        Self {
            id: spec.id.to_string(),
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            category: spec.category,
        }
    }

    /// Build from model-provided fields, filling gaps from the catalog
    fn resolve(id: &str, name: &str, description: Option<String>) -> Self {
        let id = id.trim();
        match catalog::find_method(id) {
            Some(spec) => Self {
                id: spec.id.to_string(),
                name: name.trim().to_string(),
                description: description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| spec.description.to_string()),
                category: spec.category,
            },
            None => Self {
                id: id.to_string(),
                name: name.trim().to_string(),
                description: description.unwrap_or_default(),
                category: MethodCategory::Other,
            },
        }
    }
}

/// Outcome of one assumption check cited in a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumptionCheck {
    /// Assumption name (e.g. "normality")
    pub name: String,
    /// Whether the assumption holds
    pub passed: bool,
    /// Test p-value, when one was computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

/// Column names assigned to analysis roles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableAssignments {
    #[serde(
        default,
        deserialize_with = "lenient_opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub dependent: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub independent: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub factor: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub covariate: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub within: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub between: Option<Vec<String>>,
}

impl VariableAssignments {
    fn roles_mut(&mut self) -> [&mut Option<Vec<String>>; 6] {
        [
            &mut self.dependent,
            &mut self.independent,
            &mut self.factor,
            &mut self.covariate,
            &mut self.within,
            &mut self.between,
        ]
    }

    /// Whether no role has any column
    pub fn is_empty(&self) -> bool {
        [
            &self.dependent,
            &self.independent,
            &self.factor,
            &self.covariate,
            &self.within,
            &self.between,
        ]
        .iter()
        .all(|role| role.is_none())
    }

    /// Keep only known column names.
    ///
    /// A role left with no names becomes `None`; returns `None` when every
    /// role ends up empty.
    pub fn filtered(mut self, known_columns: &HashSet<String>) -> Option<Self> {
        for role in self.roles_mut() {
            if let Some(names) = role.take() {
                let kept: Vec<String> = names
                    .into_iter()
                    .filter(|name| {
                        let known = known_columns.contains(name);
                        if !known {
                            debug!("Dropping unknown column from variable assignments: {}", name);
                        }
                        known
                    })
                    .collect();
                if !kept.is_empty() {
                    *role = Some(kept);
                }
            }
        }

        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// A structured recommendation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Recommended method
    pub method: MethodInfo,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Reasoning steps
    pub reasoning: Vec<String>,
    /// Assumptions the method relies on
    pub assumptions: Vec<AssumptionCheck>,
    /// Alternative methods
    pub alternatives: Vec<MethodInfo>,
    /// Proposed column roles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_assignments: Option<VariableAssignments>,
    /// Method-specific settings, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_settings: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_preprocessing: Option<Vec<String>>,
    /// Note on how the question could be read differently
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguity_note: Option<String>,
}

impl Recommendation {
    /// Sanitize model output, extract its JSON object and parse it.
    ///
    /// Returns `None` for any output that does not carry a valid payload.
    pub fn from_model_output(text: &str) -> Option<Self> {
        let cleaned = strip_thinking(text);
        let json = extract_json_object(&cleaned)?;
        Self::from_json(json)
    }

    /// Parse an extracted JSON object
    pub fn from_json(json: &str) -> Option<Self> {
        match serde_json::from_str::<RecommendationPayload>(json) {
            Ok(payload) => payload.into_recommendation(),
            Err(e) => {
                debug!("Recommendation payload rejected: {}", e);
                None
            }
        }
    }

    /// Restrict variable assignments to the caller's columns.
    ///
    /// With no known columns at all nothing can be verified, so the
    /// assignments are dropped.
    pub fn filter_variable_assignments(&mut self, known_columns: &HashSet<String>) {
        self.variable_assignments = if known_columns.is_empty() {
            None
        } else {
            self.variable_assignments
                .take()
                .and_then(|assignments| assignments.filtered(known_columns))
        };
    }
}

/// Wire shape of the JSON a model is asked to produce
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationPayload {
    #[serde(default)]
    method_id: Option<String>,
    #[serde(default)]
    method_name: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    reasoning: Vec<String>,
    #[serde(default)]
    assumptions: Option<Vec<Value>>,
    #[serde(default)]
    alternatives: Option<Vec<Value>>,
    #[serde(default)]
    variable_assignments: Option<Value>,
    #[serde(default)]
    suggested_settings: Option<Value>,
    #[serde(default, deserialize_with = "lenient_opt_list")]
    warnings: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_opt_list")]
    data_preprocessing: Option<Vec<String>>,
    #[serde(default)]
    ambiguity_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlternativePayload {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl RecommendationPayload {
    fn into_recommendation(self) -> Option<Recommendation> {
        let method_id = self.method_id.filter(|s| !s.trim().is_empty())?;
        let method_name = self.method_name.filter(|s| !s.trim().is_empty())?;

        let confidence = self
            .confidence
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE);

        let assumptions = self
            .assumptions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value::<AssumptionCheck>(v).ok())
            .collect();

        let alternatives = self
            .alternatives
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value::<AlternativePayload>(v).ok())
            .filter(|alt| !alt.id.trim().is_empty())
            .map(|alt| MethodInfo::resolve(&alt.id, &alt.name, alt.description))
            .collect();

        let variable_assignments = self
            .variable_assignments
            .and_then(|v| serde_json::from_value::<VariableAssignments>(v).ok())
            .filter(|a| !a.is_empty());

        Some(Recommendation {
            method: MethodInfo::resolve(&method_id, &method_name, None),
            confidence,
            reasoning: self.reasoning,
            assumptions,
            alternatives,
            variable_assignments,
            suggested_settings: self.suggested_settings.filter(|v| !v.is_null()),
            warnings: self.warnings,
            data_preprocessing: self.data_preprocessing,
            ambiguity_note: self.ambiguity_note.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Accept a string or an array; keep only non-blank string entries
fn lenient_strings(value: Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(lenient_strings).unwrap_or_default())
}

fn lenient_opt_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(lenient_strings).filter(|list| !list.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_minimal_payload() {
        let rec =
            Recommendation::from_json(r#"{"methodId":"t-test","methodName":"T-Test"}"#).unwrap();
        assert_eq!(rec.method.id, "t-test");
        assert_eq!(rec.method.name, "T-Test");
        assert_eq!(rec.method.category, MethodCategory::Other);
        assert_eq!(rec.confidence, DEFAULT_CONFIDENCE);
        assert!(rec.reasoning.is_empty());
        assert!(rec.variable_assignments.is_none());
    }

    #[test]
    fn test_missing_mandatory_fields_rejected() {
        assert!(Recommendation::from_json(r#"{"methodId":"t-test"}"#).is_none());
        assert!(Recommendation::from_json(r#"{"methodName":"T-Test"}"#).is_none());
        assert!(Recommendation::from_json(r#"{"methodId":" ","methodName":"T-Test"}"#).is_none());
        assert!(Recommendation::from_json(r#"{"methodId":1,"methodName":"T-Test"}"#).is_none());
    }

    #[test]
    fn test_catalog_fields_resolved() {
        let rec = Recommendation::from_json(
            r#"{"methodId":"one-way-anova","methodName":"ANOVA",
                "alternatives":[{"id":"kruskal-wallis","name":"Kruskal"},{"id":"custom","name":"Custom","description":"mine"},{"bad":true}]}"#,
        )
        .unwrap();
        assert_eq!(rec.method.category, MethodCategory::Comparison);
        assert!(!rec.method.description.is_empty());
        assert_eq!(rec.alternatives.len(), 2);
        assert_eq!(rec.alternatives[0].category, MethodCategory::Nonparametric);
        assert_eq!(rec.alternatives[1].description, "mine");
        assert_eq!(rec.alternatives[1].category, MethodCategory::Other);
    }

    #[test]
    fn test_confidence_clamped_and_defaulted() {
        let rec =
            Recommendation::from_json(r#"{"methodId":"a","methodName":"A","confidence":1.7}"#)
                .unwrap();
        assert_eq!(rec.confidence, 1.0);
        let rec =
            Recommendation::from_json(r#"{"methodId":"a","methodName":"A","confidence":-2}"#)
                .unwrap();
        assert_eq!(rec.confidence, 0.0);
        let rec =
            Recommendation::from_json(r#"{"methodId":"a","methodName":"A","confidence":"high"}"#)
                .unwrap();
        assert_eq!(rec.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_lenient_lists() {
        let rec = Recommendation::from_json(
            r#"{"methodId":"a","methodName":"A","reasoning":"single reason","warnings":["w1",3,""],"dataPreprocessing":[]}"#,
        )
        .unwrap();
        assert_eq!(rec.reasoning, vec!["single reason"]);
        assert_eq!(rec.warnings, Some(vec!["w1".to_string()]));
        assert_eq!(rec.data_preprocessing, None);
    }

    #[test]
    fn test_from_model_output_strips_thinking_and_prose() {
        let text = "<think>{\"methodId\":\"wrong\"}</think>Sure! {\"methodId\":\"chi-square\",\"methodName\":\"Chi-Square\"} hope it helps";
        let rec = Recommendation::from_model_output(text).unwrap();
        assert_eq!(rec.method.id, "chi-square");
        assert!(Recommendation::from_model_output("I think a t-test fits.").is_none());
    }

    #[test]
    fn test_filter_variable_assignments() {
        let mut rec = Recommendation::from_json(
            r#"{"methodId":"a","methodName":"A","variableAssignments":{"dependent":["income"],"independent":["age","ghost_var"]}}"#,
        )
        .unwrap();
        rec.filter_variable_assignments(&columns(&["age", "income"]));
        let assignments = rec.variable_assignments.unwrap();
        assert_eq!(assignments.dependent, Some(vec!["income".to_string()]));
        assert_eq!(assignments.independent, Some(vec!["age".to_string()]));
    }

    #[test]
    fn test_filter_removes_emptied_role() {
        let mut rec = Recommendation::from_json(
            r#"{"methodId":"a","methodName":"A","variableAssignments":{"dependent":["income"],"independent":["ghost_var"]}}"#,
        )
        .unwrap();
        rec.filter_variable_assignments(&columns(&["age", "income"]));
        let assignments = rec.variable_assignments.unwrap();
        assert_eq!(assignments.independent, None);

        let json = serde_json::to_value(&assignments).unwrap();
        assert!(json.get("independent").is_none());
    }

    #[test]
    fn test_filter_drops_assignments_when_all_roles_empty() {
        let mut rec = Recommendation::from_json(
            r#"{"methodId":"a","methodName":"A","variableAssignments":{"dependent":"ghost"}}"#,
        )
        .unwrap();
        rec.filter_variable_assignments(&columns(&["age"]));
        assert!(rec.variable_assignments.is_none());
    }

    #[test]
    fn test_filter_with_no_known_columns_drops_assignments() {
        let mut rec = Recommendation::from_json(
            r#"{"methodId":"a","methodName":"A","variableAssignments":{"dependent":["income"]}}"#,
        )
        .unwrap();
        rec.filter_variable_assignments(&HashSet::new());
        assert!(rec.variable_assignments.is_none());
    }

    #[test]
    fn test_serializes_camel_case() {
        let rec = Recommendation::from_json(
            r#"{"methodId":"a","methodName":"A","ambiguityNote":"could be paired","assumptions":[{"name":"normality","passed":true,"pValue":0.2}]}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["ambiguityNote"], "could be paired");
        assert_eq!(json["assumptions"][0]["pValue"], 0.2);
        assert_eq!(json["method"]["category"], "other");
        assert!(json.get("warnings").is_none());
    }
}
