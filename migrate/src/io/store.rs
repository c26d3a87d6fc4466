//! Recorded-version storage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::atomic::write_atomic;

/// Key-value store holding the recorded version per component.
pub trait VersionStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Store backed by a JSON object on disk (`.migrate/state.json`).
///
/// Every `set` rewrites the whole file atomically, so a crash leaves either the
/// old or the new record. A file that exists but does not parse, including an
/// empty one, is an error and never reads as "nothing recorded".
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read version store {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse version store {}", self.path.display()))
    }
}

impl VersionStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.load()?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        debug!(path = %self.path.display(), key, value, "writing recorded version");
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        let mut buf = serde_json::to_string_pretty(&entries)?;
        buf.push('\n');
        write_atomic(&self.path, "json.tmp", &buf)
    }
}
