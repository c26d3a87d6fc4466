//! Planning helpers for `update-migrate status`, `plan` and `run`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::version::Version;
use crate::io::config::load_config;
use crate::io::init::MigratePaths;
use crate::migrator::Migrator;

/// Where a component stands relative to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Recorded version already satisfies the target.
    Current {
        recorded: Version,
        target: Version,
    },
    /// A run is due; `path` lists the steps it would apply.
    Behind {
        from: Option<Version>,
        to: Version,
        path: Vec<Version>,
    },
}

impl PlanOutcome {
    pub fn is_current(&self) -> bool {
        matches!(self, PlanOutcome::Current { .. })
    }
}

/// Classify a migrator without running anything.
pub fn plan_migrator(migrator: &Migrator) -> Result<PlanOutcome> {
    let target = migrator.target().clone();
    if let Some(recorded) = migrator.recorded().filter(|_| migrator.is_current()) {
        return Ok(PlanOutcome::Current {
            recorded: recorded.clone(),
            target,
        });
    }
    Ok(PlanOutcome::Behind {
        from: migrator.recorded().cloned(),
        path: migrator.plan()?,
        to: target,
    })
}

/// Load `migrate.toml` and the store from disk and plan the next run.
pub fn plan_from_root(root: &Path, target: Option<Version>) -> Result<PlanOutcome> {
    let paths = MigratePaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let migrator =
        Migrator::from_config(root, &cfg, target).with_context(|| "load migrator for planning")?;
    plan_migrator(&migrator)
}
