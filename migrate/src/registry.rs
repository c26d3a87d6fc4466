//! One migrator per component prefix.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::debug;

use crate::migrator::Migrator;

pub type SharedMigrator = Arc<Mutex<Migrator>>;

/// Hands out the same migrator for a prefix for the life of the registry.
///
/// Callers that share a registry never run a component's migration twice: the
/// first caller constructs the migrator, every later caller gets that instance
/// and its cached outcome.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: Mutex<HashMap<String, SharedMigrator>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the migrator for `prefix`, building it with `init` if absent.
    ///
    /// A failed `init` registers nothing; the next call tries again.
    pub fn get_or_try_init<F>(&self, prefix: &str, init: F) -> Result<SharedMigrator>
    where
        F: FnOnce() -> Result<Migrator>,
    {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(prefix) {
            return Ok(existing.clone());
        }
        let migrator = Arc::new(Mutex::new(init()?));
        debug!(prefix, "registered migrator");
        instances.insert(prefix.to_string(), migrator.clone());
        Ok(migrator)
    }

    pub fn get(&self, prefix: &str) -> Option<SharedMigrator> {
        self.instances.lock().get(prefix).cloned()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut prefixes: Vec<String> = self.instances.lock().keys().cloned().collect();
        prefixes.sort();
        f.debug_struct("InstanceRegistry")
            .field("prefixes", &prefixes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StepResult;
    use crate::core::version::Version;
    use crate::io::loader::StepRegistry;
    use crate::migrator::MigratorSettings;
    use crate::test_support::{MemoryStore, component};
    use anyhow::anyhow;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn migrator(updates_dir: &Path, calls: Arc<AtomicUsize>) -> Result<Migrator> {
        let mut steps = StepRegistry::new();
        steps.register_fn("1.1", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(StepResult::Applied)
        })?;
        Migrator::new(
            MigratorSettings {
                component: component(),
                target: Version::parse("1.1")?,
                updates_dir: updates_dir.to_path_buf(),
                step_extension: "toml".to_string(),
                content_dir: updates_dir.to_path_buf(),
            },
            Box::new(MemoryStore::with_version("acme_version", "1.0")),
            Box::new(steps),
        )
    }

    #[test]
    fn same_prefix_shares_one_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("1.1.toml"), "").expect("step file");
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = InstanceRegistry::new();

        let first = registry
            .get_or_try_init("acme", || migrator(temp.path(), calls.clone()))
            .expect("first");
        let second = registry
            .get_or_try_init("acme", || Err(anyhow!("must not rebuild")))
            .expect("second");
        assert!(Arc::ptr_eq(&first, &second));

        first.lock().update();
        second.lock().update();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.lock().result(), Some(true));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_init_registers_nothing() {
        let registry = InstanceRegistry::new();
        let err = registry
            .get_or_try_init("acme", || Err(anyhow!("store unavailable")))
            .unwrap_err();
        assert!(err.to_string().contains("store unavailable"));
        assert!(registry.is_empty());
        assert!(registry.get("acme").is_none());
    }
}
