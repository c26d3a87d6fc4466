//! File-backed step loader.
//!
//! Each step file `updates/<version>.<ext>` is a TOML manifest with one table
//! per entry point:
//!
//! ```toml
//! [acme_update_to_1_3_0]
//! command = ["sh", "scripts/backfill.sh"]
//! timeout_secs = 120
//! ```
//!
//! A manifest that lacks the table for its own version resolves to no step.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{Diagnosis, StepResult, entry_point_name};
use crate::core::version::Version;
use crate::io::discovery::step_file_path;
use crate::io::loader::{MigrationStep, StepLoader};
use crate::io::process::run_command_with_timeout;

/// One entry point inside a step manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    /// Program followed by its arguments, run from the project root.
    pub command: Vec<String>,
    /// Overrides the configured step timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Loader that reads step manifests from the updates directory.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    pub root: PathBuf,
    pub updates_dir: PathBuf,
    pub extension: String,
    pub prefix: String,
    pub default_timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ManifestLoader {
    fn read_manifest(&self, path: &Path) -> Result<BTreeMap<String, ManifestEntry>> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read step {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse step {}", path.display()))
    }
}

impl StepLoader for ManifestLoader {
    #[instrument(skip_all, fields(version = %version))]
    fn resolve(&self, version: &Version) -> Result<Option<Arc<dyn MigrationStep>>> {
        let path = step_file_path(&self.updates_dir, version, &self.extension);
        if !path.is_file() {
            debug!(path = %path.display(), "step file missing");
            return Ok(None);
        }
        let entry_point = entry_point_name(&self.prefix, version);
        let mut manifest = self.read_manifest(&path)?;
        let Some(entry) = manifest.remove(&entry_point) else {
            debug!(path = %path.display(), entry_point = %entry_point, "entry point not defined");
            return Ok(None);
        };
        if entry.command.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!(
                "{}: [{entry_point}] command must be a non-empty array",
                path.display()
            ));
        }
        let timeout = entry
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map_or(self.default_timeout, Duration::from_secs);
        Ok(Some(Arc::new(CommandStep {
            entry_point,
            version: version.to_string(),
            command: entry.command,
            workdir: self.root.clone(),
            timeout,
            output_limit_bytes: self.output_limit_bytes,
        })))
    }
}

/// Step body that runs an external command.
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub entry_point: String,
    pub version: String,
    pub command: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl MigrationStep for CommandStep {
    #[instrument(skip_all, fields(entry_point = %self.entry_point, timeout_secs = self.timeout.as_secs()))]
    fn apply(&self) -> Result<StepResult> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("{}: empty command", self.entry_point))?;
        info!(program = %program, "running step command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("UPDATE_MIGRATE_VERSION", &self.version)
            .env("UPDATE_MIGRATE_ENTRY_POINT", &self.entry_point);
        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {}", self.entry_point))?;

        if output.timed_out {
            warn!("step command timed out");
            return Ok(StepResult::Failed(
                Diagnosis::new(&self.entry_point).with_message(format!(
                    "The update `{}` timed out after {}s.",
                    self.entry_point,
                    self.timeout.as_secs()
                )),
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "step command failed");
            let status = output
                .status
                .code()
                .map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
            let mut diagnosis = Diagnosis::new(&self.entry_point).with_message(format!(
                "The update `{}` exited with {status}.",
                self.entry_point
            ));
            let stderr = output.stderr_lossy();
            if !stderr.is_empty() {
                diagnosis = diagnosis.with_message(stderr);
            }
            return Ok(StepResult::Failed(diagnosis));
        }

        debug!(stdout = %output.stdout_lossy(), "step command succeeded");
        Ok(StepResult::Applied)
    }
}
