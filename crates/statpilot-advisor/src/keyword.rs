//! Deterministic keyword matcher used when no model produced a recommendation

use tracing::debug;

use crate::catalog::{self, MethodSpec, METHODS};
use crate::recommendation::{MethodInfo, Recommendation};

/// Confidence with no keyword hits
const BASE_CONFIDENCE: f64 = 0.3;
/// Confidence added per keyword hit
const CONFIDENCE_PER_HIT: f64 = 0.1;
/// Keyword matches are never presented as confident
const MAX_CONFIDENCE: f64 = 0.6;
/// Runner-up methods listed as alternatives
const MAX_ALTERNATIVES: usize = 2;

/// Warning attached to every keyword-based recommendation
pub const KEYWORD_WARNING: &str =
    "This suggestion was produced by keyword matching, not by an AI model. Review it carefully.";

/// Recommend a method from keywords in `user_input`. Never fails.
pub fn keyword_recommendation(user_input: &str) -> Recommendation {
    let input = user_input.to_lowercase();

    let mut scored: Vec<(usize, &'static MethodSpec)> = METHODS
        .iter()
        .map(|method| (score(method, &input), method))
        .filter(|(hits, _)| *hits > 0)
        .collect();
    // Stable sort keeps catalog order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let (hits, best) = scored
        .first()
        .copied()
        .unwrap_or((0, catalog::descriptive_stats()));
    debug!("Keyword fallback picked {} with {} hits", best.id, hits);

    let alternatives = scored
        .iter()
        .filter(|(_, method)| method.id != best.id)
        .take(MAX_ALTERNATIVES)
        .map(|(_, method)| MethodInfo::from_spec(method))
        .collect();

    let reasoning = if hits == 0 {
        vec![
            "No analysis keywords were recognized; starting with descriptive statistics is a \
             safe first step."
                .to_string(),
        ]
    } else {
        let matched: Vec<&str> = best
            .keywords
            .iter()
            .copied()
            .filter(|k| input.contains(k))
            .collect();
        vec![format!(
            "The question mentions {}, which suggests {}.",
            matched.join(", "),
            best.name
        )]
    };

    Recommendation {
        method: MethodInfo::from_spec(best),
        confidence: confidence(hits),
        reasoning,
        assumptions: Vec::new(),
        alternatives,
        variable_assignments: None,
        suggested_settings: None,
        warnings: Some(vec![KEYWORD_WARNING.to_string()]),
        data_preprocessing: None,
        ambiguity_note: None,
    }
}

fn score(method: &MethodSpec, input: &str) -> usize {
    method.keywords.iter().filter(|k| input.contains(*k)).count()
}

fn confidence(hits: usize) -> f64 {
    (BASE_CONFIDENCE + CONFIDENCE_PER_HIT * hits as f64).min(MAX_CONFIDENCE)
}
