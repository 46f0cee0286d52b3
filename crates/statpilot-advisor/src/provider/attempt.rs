//! Bookkeeping for the per-model fallback sweep
//!
//! Each model attempt ends in success, a soft failure (the backend answered
//! but the answer was unusable) or a hard failure (transport or authorization
//! error). Hard failures are collected and only turned into an error once the
//! whole model list is exhausted.

use tracing::{debug, warn};

use crate::error::AdvisorError;

/// How one model attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// Usable result; the sweep stops
    Success(T),
    /// Backend answered with nothing usable; never raised on its own
    Soft(String),
    /// Transport or authorization failure
    Hard(AdvisorError),
}

impl<T> Attempt<T> {
    /// Classify a transport error.
    ///
    /// A missing model is a soft failure since the backend itself is fine.
    pub fn from_error(err: AdvisorError) -> Self {
        match err {
            AdvisorError::ModelUnavailable(_) => Attempt::Soft(err.to_string()),
            other => Attempt::Hard(other),
        }
    }
}

/// Failures collected while sweeping one provider's model list
#[derive(Debug, Clone)]
pub struct FailureLedger {
    provider: String,
    hard: Vec<String>,
    soft: Vec<String>,
}

impl FailureLedger {
    /// Empty ledger for `provider`
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            hard: Vec::new(),
            soft: Vec::new(),
        }
    }

    /// Record a soft failure
    pub fn soft(&mut self, model: &str, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("Soft failure from {} model {}: {}", self.provider, model, reason);
        self.soft.push(format!("{}: {}", model, reason));
    }

    /// Record a hard failure
    pub fn hard(&mut self, model: &str, err: &AdvisorError) {
        warn!("Hard failure from {} model {}: {}", self.provider, model, err);
        self.hard.push(format!("{}: {}", model, err));
    }

    /// Finish a non-streaming sweep: raise if anything hard-failed, else return `empty`
    pub fn finish<T>(self, empty: T) -> Result<T, AdvisorError> {
        if self.hard.is_empty() {
            debug!(
                "All {} models produced unusable output ({} soft failures)",
                self.provider,
                self.soft.len()
            );
            Ok(empty)
        } else {
            Err(AdvisorError::AllModelsFailed {
                provider: self.provider,
                failures: self.hard,
            })
        }
    }

    /// Finish a streaming sweep, which has no empty result to fall back on
    pub fn into_error(self) -> AdvisorError {
        let mut failures = self.hard;
        failures.extend(self.soft);
        if failures.is_empty() {
            failures.push("no models configured".to_string());
        }
        AdvisorError::AllModelsFailed {
            provider: self.provider,
            failures,
        }
    }
}
