//! Step bodies and the loaders that resolve them.
//!
//! A [`StepLoader`] maps a discovered version to an invocable [`MigrationStep`].
//! Resolution is a lookup: `Ok(None)` means the step file exists but provides
//! no entry point for that version, which the runner reports before anything
//! is invoked.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::core::types::StepResult;
use crate::core::version::Version;

/// One versioned upgrade action.
pub trait MigrationStep: Send + Sync {
    /// Run the step. `Err` is an unclassified failure.
    fn apply(&self) -> Result<StepResult>;
}

impl<F> MigrationStep for F
where
    F: Fn() -> Result<StepResult> + Send + Sync,
{
    fn apply(&self) -> Result<StepResult> {
        self()
    }
}

/// Resolves versions to step bodies.
pub trait StepLoader {
    fn resolve(&self, version: &Version) -> Result<Option<Arc<dyn MigrationStep>>>;
}

/// In-process table of steps keyed by version.
#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<Version, Arc<dyn MigrationStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` for `version`. Equal versions (`1.5` and `1.5.0`) collide.
    pub fn register(&mut self, version: &str, step: Arc<dyn MigrationStep>) -> Result<()> {
        let version = Version::parse(version)?;
        if self.steps.contains_key(&version) {
            return Err(anyhow!("step already registered for version {version}"));
        }
        self.steps.insert(version, step);
        Ok(())
    }

    pub fn register_fn<F>(&mut self, version: &str, step: F) -> Result<()>
    where
        F: Fn() -> Result<StepResult> + Send + Sync + 'static,
    {
        self.register(version, Arc::new(step))
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.steps.contains_key(version)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut versions: Vec<&Version> = self.steps.keys().collect();
        versions.sort();
        f.debug_struct("StepRegistry")
            .field("versions", &versions)
            .finish()
    }
}

impl StepLoader for StepRegistry {
    fn resolve(&self, version: &Version) -> Result<Option<Arc<dyn MigrationStep>>> {
        Ok(self.steps.get(version).cloned())
    }
}
