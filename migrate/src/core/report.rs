//! Accumulates the human-readable narrative of one run.

use serde::{Deserialize, Serialize};

use crate::core::types::{Outcome, StepError};

/// The single failure diagnosis of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNarrative {
    pub title: String,
    pub messages: Vec<String>,
}

impl FailureNarrative {
    /// Messages separated by blank lines.
    pub fn body(&self) -> String {
        self.messages.join("\n\n")
    }
}

/// Run outcome plus success and failure narratives.
///
/// Success entries are append-only. A failure overwrites any earlier one, but
/// the runner stops at the first failure so at most one is ever recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reporter {
    component_name: String,
    to_version: String,
    successes: Vec<String>,
    failure: Option<FailureNarrative>,
    outcome: Outcome,
}

impl Reporter {
    pub fn new(component_name: impl Into<String>, to_version: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            to_version: to_version.into(),
            successes: Vec::new(),
            failure: None,
            outcome: Outcome::Pending,
        }
    }

    pub fn record_success(&mut self, message: impl Into<String>) {
        self.successes.push(message.into());
    }

    pub fn record_failure(&mut self, error: &StepError) {
        self.failure = Some(FailureNarrative {
            title: format!(
                "{} - Error updating to version {}",
                self.component_name, self.to_version
            ),
            messages: error.messages(&self.component_name),
        });
    }

    pub fn succeed(&mut self) {
        self.outcome = Outcome::Succeeded;
    }

    pub fn fail(&mut self) {
        self.outcome = Outcome::Failed;
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// `None` until the run completes.
    pub fn result(&self) -> Option<bool> {
        self.outcome.as_bool()
    }

    pub fn success_entries(&self) -> &[String] {
        &self.successes
    }

    /// Success entries joined by newlines (empty when nothing was applied).
    pub fn success_narrative(&self) -> String {
        self.successes.join("\n")
    }

    pub fn success_title(&self) -> String {
        format!(
            "{} - Success updating to version {}",
            self.component_name, self.to_version
        )
    }

    pub fn failure(&self) -> Option<&FailureNarrative> {
        self.failure.as_ref()
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn to_version(&self) -> &str {
        &self.to_version
    }
}
