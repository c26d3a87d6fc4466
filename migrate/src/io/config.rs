//! Project configuration stored in `migrate.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::types::Component;
use crate::core::version::Version;
use crate::io::atomic::write_atomic;

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("prefix regex should be valid"));

/// Migration configuration (TOML).
///
/// Edited by humans. Everything except `[component]` has a default.
/// Relative paths resolve against the project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MigrateConfig {
    /// Directory holding one step file per version.
    pub updates_dir: PathBuf,

    /// File extension (without dot) that marks a step file.
    pub step_extension: String,

    /// JSON file backing the recorded-version store.
    pub state_path: PathBuf,

    /// Directory named in remediation guidance when a run fails.
    pub content_dir: PathBuf,

    /// Default wall-clock budget for a single step command.
    pub step_timeout_secs: u64,

    /// Truncate captured step stdout/stderr beyond this many bytes.
    pub step_output_limit_bytes: usize,

    pub component: ComponentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ComponentConfig {
    /// Display name used in notices.
    pub name: String,
    /// snake_case namespace for store keys and entry points.
    pub prefix: String,
    /// Version of the deployed artifact (the migration target).
    pub version: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            updates_dir: PathBuf::from("updates"),
            step_extension: "toml".to_string(),
            state_path: PathBuf::from(".migrate/state.json"),
            content_dir: PathBuf::from("."),
            step_timeout_secs: 10 * 60,
            step_output_limit_bytes: 100_000,
            component: ComponentConfig::default(),
        }
    }
}

impl MigrateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.component.name.trim().is_empty() {
            return Err(anyhow!("component.name must be non-empty"));
        }
        if !PREFIX_RE.is_match(&self.component.prefix) {
            return Err(anyhow!(
                "component.prefix must be snake_case (got '{}')",
                self.component.prefix
            ));
        }
        Version::parse(&self.component.version).context("component.version")?;
        if self.step_extension.is_empty() || self.step_extension.contains('.') {
            return Err(anyhow!("step_extension must be non-empty and contain no '.'"));
        }
        if self.step_timeout_secs == 0 {
            return Err(anyhow!("step_timeout_secs must be > 0"));
        }
        if self.step_output_limit_bytes == 0 {
            return Err(anyhow!("step_output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn component(&self) -> Component {
        Component {
            name: self.component.name.clone(),
            prefix: self.component.prefix.clone(),
        }
    }

    /// Target version; only valid after `validate`.
    pub fn target_version(&self) -> Result<Version> {
        Version::parse(&self.component.version).context("component.version")
    }

    pub fn updates_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.updates_dir)
    }

    pub fn state_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_path)
    }

    pub fn content_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.content_dir)
    }
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<MigrateConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "missing {} (run `update-migrate init`)",
            path.display()
        ));
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MigrateConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &MigrateConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, "toml.tmp", &buf)
}
