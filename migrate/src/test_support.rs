//! Test-only helpers: in-memory store, scripted steps, scratch projects.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;

use crate::core::types::Component;
use crate::core::version::Version;
use crate::io::init::{InitOptions, MigratePaths, init_project};
use crate::io::store::VersionStore;

/// Deterministic component used across tests.
pub fn component() -> Component {
    Component {
        name: "Acme".to_string(),
        prefix: "acme".to_string(),
    }
}

/// Parse a list of version strings, panicking on invalid input.
pub fn versions(raw: &[&str]) -> Vec<Version> {
    raw.iter()
        .map(|r| Version::parse(r).expect("valid version"))
        .collect()
}

/// In-memory [`VersionStore`] that logs every successful write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<String>>,
    failing_values: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn with_version(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.entries.lock().insert(key.to_string(), value.to_string());
        store
    }

    /// Make every `set` of `value` fail.
    pub fn fail_writes_for(&self, value: &str) {
        self.failing_values.lock().insert(value.to_string());
    }

    /// Values written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    pub fn current(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl VersionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.current(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.failing_values.lock().contains(value) {
            return Err(anyhow!("injected write failure"));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        self.writes.lock().push(value.to_string());
        Ok(())
    }
}

/// Scratch project with `migrate.toml`, `updates/` and `.migrate/`.
pub struct TestProject {
    temp: tempfile::TempDir,
    pub paths: MigratePaths,
}

impl TestProject {
    /// Initialize a project for component `Acme` (`acme`) at `version`.
    pub fn new(version: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let paths = init_project(
            temp.path(),
            &InitOptions {
                force: false,
                name: "Acme".to_string(),
                prefix: "acme".to_string(),
                version: version.to_string(),
            },
        )?;
        Ok(Self { temp, paths })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn updates_dir(&self) -> PathBuf {
        self.path().join("updates")
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join(".migrate").join("state.json")
    }

    /// Write a step manifest whose entry point runs `script` with `sh -c`.
    pub fn write_step(&self, version: &str, script: &str) -> Result<()> {
        let entry = format!("acme_update_to_{}", version.replace('.', "_"));
        let body = format!(
            "[{entry}]\ncommand = [\"sh\", \"-c\", {}]\n",
            toml_string(script)
        );
        self.write_raw_step(version, &body)
    }

    /// Write a step file with arbitrary contents.
    pub fn write_raw_step(&self, version: &str, contents: &str) -> Result<()> {
        let path = self.updates_dir().join(format!("{version}.toml"));
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Seed the recorded version directly in the state file.
    pub fn record_version(&self, version: &str) -> Result<()> {
        let mut entries = BTreeMap::new();
        entries.insert("acme_version".to_string(), version.to_string());
        let mut buf = serde_json::to_string_pretty(&entries)?;
        buf.push('\n');
        fs::write(self.state_path(), buf).context("write state")
    }

    pub fn recorded_version(&self) -> Result<Option<String>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).context("read state")?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        Ok(entries.get("acme_version").cloned())
    }
}

fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
