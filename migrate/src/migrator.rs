//! Per-component orchestrator: trigger gating, one run, notices.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::path::build_path;
use crate::core::types::Component;
use crate::core::version::Version;
use crate::io::config::MigrateConfig;
use crate::io::discovery::discover_steps;
use crate::io::loader::StepLoader;
use crate::io::manifest::ManifestLoader;
use crate::io::notice::Notice;
use crate::io::store::{JsonFileStore, VersionStore};
use crate::runner::{MigrationRunner, RunSummary};

/// Where steps live and how to describe the component.
#[derive(Debug, Clone)]
pub struct MigratorSettings {
    pub component: Component,
    /// Version of the deployed artifact.
    pub target: Version,
    pub updates_dir: PathBuf,
    pub step_extension: String,
    /// Directory named in remediation guidance.
    pub content_dir: PathBuf,
}

/// Migrates one component from its recorded version to its target.
///
/// The recorded version is read once, at construction. `update` runs at most
/// once per instance; later calls return the same summary.
pub struct Migrator {
    settings: MigratorSettings,
    store: Box<dyn VersionStore + Send>,
    loader: Box<dyn StepLoader + Send>,
    recorded: Option<Version>,
    summary: Option<RunSummary>,
}

impl Migrator {
    pub fn new(
        settings: MigratorSettings,
        store: Box<dyn VersionStore + Send>,
        loader: Box<dyn StepLoader + Send>,
    ) -> Result<Self> {
        let key = settings.component.version_key();
        let recorded = store
            .get(&key)
            .with_context(|| format!("read recorded version {key}"))?
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| Version::lenient(&raw));
        debug!(
            key = %key,
            recorded = ?recorded.as_ref().map(Version::as_str),
            target = %settings.target,
            "migrator created"
        );
        Ok(Self {
            settings,
            store,
            loader,
            recorded,
            summary: None,
        })
    }

    /// Build a migrator backed by the project's state file and step manifests.
    ///
    /// `target` overrides `component.version` from the config.
    pub fn from_config(root: &Path, cfg: &MigrateConfig, target: Option<Version>) -> Result<Self> {
        let component = cfg.component();
        let target = match target {
            Some(target) => target,
            None => cfg.target_version()?,
        };
        let updates_dir = cfg.updates_dir(root);
        let loader = ManifestLoader {
            root: root.to_path_buf(),
            updates_dir: updates_dir.clone(),
            extension: cfg.step_extension.clone(),
            prefix: component.prefix.clone(),
            default_timeout: Duration::from_secs(cfg.step_timeout_secs),
            output_limit_bytes: cfg.step_output_limit_bytes,
        };
        let settings = MigratorSettings {
            component,
            target,
            updates_dir,
            step_extension: cfg.step_extension.clone(),
            content_dir: cfg.content_dir(root),
        };
        Self::new(
            settings,
            Box::new(JsonFileStore::new(cfg.state_path(root))),
            Box::new(loader),
        )
    }

    pub fn component(&self) -> &Component {
        &self.settings.component
    }

    pub fn recorded(&self) -> Option<&Version> {
        self.recorded.as_ref()
    }

    pub fn target(&self) -> &Version {
        &self.settings.target
    }

    /// True when the recorded version already satisfies the target.
    pub fn is_current(&self) -> bool {
        self.recorded
            .as_ref()
            .is_some_and(|recorded| *recorded >= self.settings.target)
    }

    /// The path a run would take right now.
    pub fn plan(&self) -> Result<Vec<Version>> {
        let discovered =
            discover_steps(&self.settings.updates_dir, &self.settings.step_extension)?;
        Ok(build_path(
            self.recorded.as_ref(),
            &self.settings.target,
            discovered.versions(),
        ))
    }

    /// Run the migration if the component is behind its target.
    ///
    /// Returns `None` when no run was needed. A run happens at most once per
    /// instance.
    pub fn update(&mut self) -> Option<&RunSummary> {
        if self.summary.is_none() {
            if self.is_current() {
                debug!("recorded version is current, nothing to do");
                return None;
            }
            let summary = self.execute();
            info!(
                phase = ?summary.phase,
                applied = summary.applied.len(),
                "migration finished"
            );
            self.summary = Some(summary);
        }
        self.summary.as_ref()
    }

    fn execute(&self) -> RunSummary {
        let runner = MigrationRunner::new(
            &self.settings.component,
            &self.settings.content_dir,
            self.store.as_ref(),
            self.loader.as_ref(),
            self.recorded.clone(),
            self.settings.target.clone(),
        );
        match discover_steps(&self.settings.updates_dir, &self.settings.step_extension) {
            Ok(discovered) => runner.run(&discovered),
            Err(err) => runner.fail_discovery(&err),
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// `None` until a run completes, then whether it succeeded.
    pub fn result(&self) -> Option<bool> {
        self.summary
            .as_ref()
            .and_then(|summary| summary.reporter.result())
    }

    pub fn success_notice(&self) -> Option<Notice> {
        self.summary
            .as_ref()
            .filter(|summary| summary.succeeded())
            .map(|summary| Notice::success(&summary.reporter))
    }

    pub fn failure_notice(&self) -> Option<Notice> {
        self.summary
            .as_ref()
            .and_then(|summary| Notice::failure(&summary.reporter))
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("settings", &self.settings)
            .field("recorded", &self.recorded)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}
