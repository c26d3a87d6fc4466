//! Step discovery: list the versions present in the updates directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::version::Version;

/// Versions found in one scan of the updates directory.
///
/// Rebuilt on every run and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredSteps {
    versions: Vec<Version>,
}

impl DiscoveredSteps {
    pub fn new(versions: Vec<Version>) -> Self {
        Self { versions }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// True if a step exists for exactly `version`.
    pub fn contains(&self, version: &Version) -> bool {
        self.versions.contains(version)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Path of the step file for `version`.
pub fn step_file_path(updates_dir: &Path, version: &Version, extension: &str) -> PathBuf {
    updates_dir.join(format!("{}.{extension}", version.as_str()))
}

/// Scan `updates_dir` for `<version>.<extension>` files.
///
/// A missing directory is an empty set. Files whose stem is not a dotted
/// numeric version are skipped. Results are ordered by file name.
pub fn discover_steps(updates_dir: &Path, extension: &str) -> Result<DiscoveredSteps> {
    let entries = match fs::read_dir(updates_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(dir = %updates_dir.display(), "updates directory missing");
            return Ok(DiscoveredSteps::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", updates_dir.display()));
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", updates_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        names.push(stem.to_string());
    }
    names.sort();

    let mut versions = Vec::with_capacity(names.len());
    for name in names {
        match Version::parse(&name) {
            Ok(version) => versions.push(version),
            Err(err) => debug!(name = %name, err = %err, "skipping malformed step file name"),
        }
    }
    debug!(dir = %updates_dir.display(), count = versions.len(), "discovered steps");
    Ok(DiscoveredSteps::new(versions))
}
