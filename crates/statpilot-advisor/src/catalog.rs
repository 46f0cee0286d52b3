//! Catalog of statistical methods the advisor can recommend

use serde::{Deserialize, Serialize};

/// Family a statistical method belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodCategory {
    /// Summaries and distributions
    Descriptive,
    /// Mean comparisons (t-tests, ANOVA family)
    Comparison,
    /// Rank-based alternatives
    Nonparametric,
    /// Association between variables
    Correlation,
    /// Predictive models
    Regression,
    /// Contingency-table tests
    Categorical,
    /// Not in the catalog
    Other,
}

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    /// Stable identifier used in model payloads
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Method family
    pub category: MethodCategory,
    /// Lowercase phrases that suggest this method
    pub keywords: &'static [&'static str],
}

/// Fallback when nothing else matches
pub const DESCRIPTIVE_STATS_ID: &str = "descriptive-stats";

/// All known methods, in preference order for tie-breaking
pub const METHODS: &[MethodSpec] = &[
    MethodSpec {
        id: "independent-t-test",
        name: "Independent Samples T-Test",
        description: "Compares the means of two independent groups.",
        category: MethodCategory::Comparison,
        keywords: &[
            "t-test",
            "t test",
            "two groups",
            "compare two",
            "difference between",
            "treatment vs control",
            "control group",
        ],
    },
    MethodSpec {
        id: "paired-t-test",
        name: "Paired Samples T-Test",
        description: "Compares two related measurements taken on the same subjects.",
        category: MethodCategory::Comparison,
        keywords: &[
            "paired",
            "before and after",
            "pre-post",
            "pre and post",
            "same subjects",
            "matched",
        ],
    },
    MethodSpec {
        id: "one-sample-t-test",
        name: "One-Sample T-Test",
        description: "Tests whether a sample mean differs from a known value.",
        category: MethodCategory::Comparison,
        keywords: &[
            "one sample",
            "one-sample",
            "known value",
            "population mean",
            "benchmark value",
        ],
    },
    MethodSpec {
        id: "one-way-anova",
        name: "One-Way ANOVA",
        description: "Compares means across three or more independent groups.",
        category: MethodCategory::Comparison,
        keywords: &[
            "anova",
            "three groups",
            "multiple groups",
            "more than two groups",
            "several groups",
        ],
    },
    MethodSpec {
        id: "two-way-anova",
        name: "Two-Way ANOVA",
        description: "Tests the effects of two factors and their interaction on a mean.",
        category: MethodCategory::Comparison,
        keywords: &["two-way", "two way", "two factors", "interaction effect", "factorial"],
    },
    MethodSpec {
        id: "repeated-measures-anova",
        name: "Repeated Measures ANOVA",
        description: "Compares means across three or more repeated measurements.",
        category: MethodCategory::Comparison,
        keywords: &[
            "repeated measures",
            "repeated",
            "over time",
            "time points",
            "within-subject",
            "longitudinal",
        ],
    },
    MethodSpec {
        id: "ancova",
        name: "ANCOVA",
        description: "Compares group means while adjusting for a continuous covariate.",
        category: MethodCategory::Comparison,
        keywords: &["ancova", "covariate", "adjusting for", "controlling for"],
    },
    MethodSpec {
        id: "mann-whitney",
        name: "Mann-Whitney U Test",
        description: "Rank-based comparison of two independent groups.",
        category: MethodCategory::Nonparametric,
        keywords: &[
            "mann-whitney",
            "mann whitney",
            "nonparametric",
            "non-parametric",
            "not normal",
            "skewed",
            "ordinal",
        ],
    },
    MethodSpec {
        id: "wilcoxon-signed-rank",
        name: "Wilcoxon Signed-Rank Test",
        description: "Rank-based comparison of two related measurements.",
        category: MethodCategory::Nonparametric,
        keywords: &["wilcoxon", "signed-rank", "signed rank"],
    },
    MethodSpec {
        id: "kruskal-wallis",
        name: "Kruskal-Wallis Test",
        description: "Rank-based comparison of three or more independent groups.",
        category: MethodCategory::Nonparametric,
        keywords: &["kruskal", "kruskal-wallis"],
    },
    MethodSpec {
        id: "chi-square",
        name: "Chi-Square Test of Independence",
        description: "Tests association between two categorical variables.",
        category: MethodCategory::Categorical,
        keywords: &[
            "chi-square",
            "chi square",
            "categorical",
            "contingency",
            "crosstab",
            "proportion",
            "frequencies",
        ],
    },
    MethodSpec {
        id: "fisher-exact",
        name: "Fisher's Exact Test",
        description: "Exact test of association for small 2x2 tables.",
        category: MethodCategory::Categorical,
        keywords: &["fisher", "exact test", "small sample", "2x2"],
    },
    MethodSpec {
        id: "pearson-correlation",
        name: "Pearson Correlation",
        description: "Measures linear association between two continuous variables.",
        category: MethodCategory::Correlation,
        keywords: &[
            "correlation",
            "correlated",
            "relationship between",
            "association",
            "pearson",
            "linear relationship",
        ],
    },
    MethodSpec {
        id: "spearman-correlation",
        name: "Spearman Rank Correlation",
        description: "Measures monotonic association using ranks.",
        category: MethodCategory::Correlation,
        keywords: &["spearman", "rank correlation", "monotonic"],
    },
    MethodSpec {
        id: "linear-regression",
        name: "Linear Regression",
        description: "Models a continuous outcome from one or more predictors.",
        category: MethodCategory::Regression,
        keywords: &[
            "regression",
            "predict",
            "prediction",
            "predictor",
            "effect of",
            "influence",
            "linear model",
        ],
    },
    MethodSpec {
        id: "logistic-regression",
        name: "Logistic Regression",
        description: "Models a binary outcome from one or more predictors.",
        category: MethodCategory::Regression,
        keywords: &[
            "logistic",
            "binary outcome",
            "yes/no",
            "probability of",
            "odds",
            "classification",
        ],
    },
    MethodSpec {
        id: DESCRIPTIVE_STATS_ID,
        name: "Descriptive Statistics",
        description: "Summarizes central tendency, spread and distribution of each variable.",
        category: MethodCategory::Descriptive,
        keywords: &[
            "describe",
            "summary",
            "summarize",
            "overview",
            "distribution",
            "mean and",
            "average",
        ],
    },
];

/// Look up a method by id (case-insensitive)
pub fn find_method(id: &str) -> Option<&'static MethodSpec> {
    let id = id.trim();
    METHODS.iter().find(|m| m.id.eq_ignore_ascii_case(id))
}

/// The descriptive-statistics entry
pub fn descriptive_stats() -> &'static MethodSpec {
    METHODS
        .iter()
        .find(|m| m.id == DESCRIPTIVE_STATS_ID)
        .unwrap_or(&METHODS[METHODS.len() - 1])
}

/// Comma-separated list of method ids, for prompts
pub fn method_ids() -> String {
    METHODS.iter().map(|m| m.id).collect::<Vec<_>>().join(", ")
}
