//! Shared deterministic types for the migration core.
//!
//! These types define the contracts between step bodies, the runner and the
//! reporter. They carry no I/O and render deterministically.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::version::Version;

/// Structured failure payload: a title plus ordered messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub title: String,
    pub messages: Vec<String>,
}

impl Diagnosis {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }
}

/// What a step body reports after running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Applied,
    Failed(Diagnosis),
}

/// Identity of the component being migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Human-readable name used in notices.
    pub name: String,
    /// Namespace prefix (snake_case) for store keys and entry points.
    pub prefix: String,
}

impl Component {
    /// Store key holding the recorded version.
    pub fn version_key(&self) -> String {
        format!("{}_version", self.prefix)
    }

    /// Entry point expected to carry the step for `version`.
    pub fn entry_point(&self, version: &Version) -> String {
        entry_point_name(&self.prefix, version)
    }
}

/// `<prefix>_update_to_<version with '.' replaced by '_'>`.
pub fn entry_point_name(prefix: &str, version: &Version) -> String {
    format!("{prefix}_update_to_{}", version.underscored())
}

/// Why a step (or the final sync) did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The step file exists but does not provide the expected entry point.
    MissingEntryPoint {
        entry_point: String,
        content_dir: PathBuf,
    },
    /// The step ran and reported failure.
    StepFailed(Diagnosis),
    /// Writing the recorded version did not succeed.
    Persistence {
        key: String,
        version: String,
        reason: String,
    },
    /// Anything else: loader errors, step errors without a diagnosis, panics.
    Unexpected { reason: String, content_dir: PathBuf },
}

impl StepError {
    /// User-facing messages, in display order.
    pub fn messages(&self, component_name: &str) -> Vec<String> {
        match self {
            StepError::MissingEntryPoint {
                entry_point,
                content_dir,
            } => vec![
                format!("The update failed: entry point `{entry_point}` not found."),
                remediation(component_name, content_dir),
            ],
            StepError::StepFailed(diagnosis) if !diagnosis.messages.is_empty() => {
                diagnosis.messages.clone()
            }
            StepError::StepFailed(diagnosis) => vec![
                format!(
                    "An unexpected error has occurred during the update ({}).",
                    diagnosis.title
                ),
            ],
            StepError::Persistence {
                key,
                version,
                reason,
            } => vec![format!(
                "Failed to update the `{key}` record to {version} in the version store: {reason}."
            )],
            StepError::Unexpected {
                reason,
                content_dir,
            } => vec![
                "An unexpected error has occurred during the update.".to_string(),
                remediation(component_name, content_dir),
                format!("Cause: {reason}"),
            ],
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::MissingEntryPoint { entry_point, .. } => {
                write!(f, "missing entry point {entry_point}")
            }
            StepError::StepFailed(diagnosis) => write!(f, "step failed: {}", diagnosis.title),
            StepError::Persistence { key, version, .. } => {
                write!(f, "failed to persist {key}={version}")
            }
            StepError::Unexpected { reason, .. } => write!(f, "unexpected failure: {reason}"),
        }
    }
}

impl std::error::Error for StepError {}

fn remediation(component_name: &str, content_dir: &std::path::Path) -> String {
    format!(
        "Please restore the previously used version of {component_name}, or delete {component_name} and its files in the `{}` directory if any and install the latest version.",
        content_dir.display()
    )
}

/// Runner lifecycle. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// Final run outcome, unset until the run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl Outcome {
    /// `None` while pending, otherwise whether the run succeeded.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Outcome::Pending => None,
            Outcome::Succeeded => Some(true),
            Outcome::Failed => Some(false),
        }
    }
}
