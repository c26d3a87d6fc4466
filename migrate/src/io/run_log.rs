//! Run record written to `.migrate/last_run.json`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::report::{FailureNarrative, Reporter};
use crate::core::types::Outcome;

/// What one CLI run did, for humans and scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub prefix: String,
    pub from: Option<String>,
    pub to: String,
    pub path: Vec<String>,
    pub applied: Vec<String>,
    pub outcome: Outcome,
    pub success_narrative: String,
    pub failure: Option<FailureNarrative>,
    pub duration_ms: Option<u64>,
}

impl RunRecord {
    pub fn from_report(
        prefix: &str,
        from: Option<String>,
        path: Vec<String>,
        applied: Vec<String>,
        reporter: &Reporter,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            prefix: prefix.to_string(),
            from,
            to: reporter.to_version().to_string(),
            path,
            applied,
            outcome: reporter.outcome(),
            success_narrative: reporter.success_narrative(),
            failure: reporter.failure().cloned(),
            duration_ms,
        }
    }
}

pub fn write_run_record(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(record)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

pub fn load_run_record(path: &Path) -> Result<RunRecord> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run record {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse run record {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Diagnosis, StepError};

    #[test]
    fn failed_run_record_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".migrate/last_run.json");

        let mut reporter = Reporter::new("Acme", "1.4.0");
        reporter.record_success("Updates for version 1.3.0 applied.");
        reporter.record_failure(&StepError::StepFailed(
            Diagnosis::new("acme_update_to_1_4_0").with_message("nope"),
        ));
        reporter.fail();

        let record = RunRecord::from_report(
            "acme",
            Some("1.2.0".to_string()),
            vec!["1.3.0".to_string(), "1.4.0".to_string()],
            vec!["1.3.0".to_string()],
            &reporter,
            Some(12),
        );
        write_run_record(&path, &record).expect("write");

        let loaded = load_run_record(&path).expect("load");
        assert_eq!(loaded, record);
        assert_eq!(loaded.outcome, Outcome::Failed);
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"outcome\": \"failed\""));
    }
}
