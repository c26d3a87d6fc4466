//! Project scaffolding and canonical paths.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{ComponentConfig, MigrateConfig, write_config};

/// Canonical paths for a project root.
#[derive(Debug, Clone)]
pub struct MigratePaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub lock_path: PathBuf,
    pub last_run_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl MigratePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".migrate");
        Self {
            root: root.clone(),
            config_path: root.join("migrate.toml"),
            state_dir: state_dir.clone(),
            lock_path: state_dir.join("run.lock"),
            last_run_path: state_dir.join("last_run.json"),
            gitignore_path: state_dir.join(".gitignore"),
        }
    }
}

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing `migrate.toml`.
    pub force: bool,
    pub name: String,
    pub prefix: String,
    pub version: String,
}

/// Create `migrate.toml`, `updates/` and `.migrate/` in `root`.
///
/// Fails if `migrate.toml` already exists unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<MigratePaths> {
    let paths = MigratePaths::new(root);
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }

    let cfg = MigrateConfig {
        component: ComponentConfig {
            name: options.name.clone(),
            prefix: options.prefix.clone(),
            version: options.version.clone(),
        },
        ..MigrateConfig::default()
    };
    write_config(&paths.config_path, &cfg)?;
    create_dir(&cfg.updates_dir(root))?;
    create_dir(&paths.state_dir)?;
    fs::write(&paths.gitignore_path, STATE_GITIGNORE)
        .with_context(|| format!("write {}", paths.gitignore_path.display()))?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

const STATE_GITIGNORE: &str = "run.lock\nlast_run.json\n*.tmp\n";
