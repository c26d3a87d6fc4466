//! Ordered, persist-as-you-go execution of a migration path.
//!
//! A run moves `Idle -> Running -> {Succeeded, Failed}`. Steps run strictly in
//! ascending version order; the recorded version is written after every step
//! that succeeds, so a crash or failure leaves the store at the last applied
//! step and the next run resumes from there. The first failure ends the run:
//! nothing is retried or rolled back.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::core::path::build_path;
use crate::core::report::Reporter;
use crate::core::types::{Component, RunPhase, StepError, StepResult};
use crate::core::version::Version;
use crate::io::discovery::DiscoveredSteps;
use crate::io::loader::{MigrationStep, StepLoader};
use crate::io::store::VersionStore;

/// Transient bookkeeping for one run.
#[derive(Debug, Clone)]
struct RunState {
    from: Option<Version>,
    to: Version,
    /// Last version known to be in the store.
    recorded: Option<Version>,
    phase: RunPhase,
    applied: Vec<Version>,
    reporter: Reporter,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub from: Option<Version>,
    pub to: Version,
    pub path: Vec<Version>,
    /// Steps that ran and were recorded, in order.
    pub applied: Vec<Version>,
    /// Version in the store when the run ended.
    pub recorded: Option<Version>,
    pub phase: RunPhase,
    pub reporter: Reporter,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.phase == RunPhase::Succeeded
    }
}

/// Executes one run against a store and a step loader.
pub struct MigrationRunner<'a> {
    component: &'a Component,
    content_dir: PathBuf,
    store: &'a dyn VersionStore,
    loader: &'a dyn StepLoader,
    state: RunState,
}

impl<'a> MigrationRunner<'a> {
    /// Bind a run to `from` (the recorded version, if any) and `to`.
    pub fn new(
        component: &'a Component,
        content_dir: &Path,
        store: &'a dyn VersionStore,
        loader: &'a dyn StepLoader,
        from: Option<Version>,
        to: Version,
    ) -> Self {
        let reporter = Reporter::new(&component.name, to.as_str());
        Self {
            component,
            content_dir: content_dir.to_path_buf(),
            store,
            loader,
            state: RunState {
                recorded: from.clone(),
                from,
                to,
                phase: RunPhase::Idle,
                applied: Vec::new(),
                reporter,
            },
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase
    }

    /// Build the path from `discovered` and run it to a terminal phase.
    ///
    /// Never fails: every error is converted into the run's failure narrative.
    #[instrument(skip_all, fields(prefix = %self.component.prefix, to = %self.state.to))]
    pub fn run(mut self, discovered: &DiscoveredSteps) -> RunSummary {
        let start = Instant::now();
        let path = build_path(
            self.state.from.as_ref(),
            &self.state.to,
            discovered.versions(),
        );
        self.state.phase = RunPhase::Running;
        info!(
            from = ?self.state.from.as_ref().map(Version::as_str),
            steps = path.len(),
            "migration run started"
        );

        for version in &path {
            match self.apply_step(version) {
                Ok(()) => {
                    info!(version = %version, "step applied");
                    self.state.applied.push(version.clone());
                    self.state
                        .reporter
                        .record_success(format!("Updates for version {version} applied."));
                }
                Err(err) => {
                    warn!(version = %version, err = %err, "step failed, stopping run");
                    self.fail(&err);
                    return self.finish(path, start);
                }
            }
        }

        // Sync the record when the target has no step of its own.
        if !discovered.contains(&self.state.to) {
            let to = self.state.to.clone();
            if let Err(err) = self.persist(&to) {
                warn!(err = %err, "final version sync failed");
                self.fail(&err);
                return self.finish(path, start);
            }
        }

        if !path.is_empty() {
            self.state
                .reporter
                .record_success("All updates have been applied successfully.");
        }
        self.state.reporter.succeed();
        self.state.phase = RunPhase::Succeeded;
        info!(applied = self.state.applied.len(), "migration run succeeded");
        self.finish(path, start)
    }

    /// End a run whose steps could not be discovered.
    pub fn fail_discovery(mut self, err: &anyhow::Error) -> RunSummary {
        let start = Instant::now();
        self.state.phase = RunPhase::Running;
        warn!(err = %err, "step discovery failed");
        let err = self.unexpected(format!("discover steps: {err:#}"));
        self.fail(&err);
        self.finish(Vec::new(), start)
    }

    fn apply_step(&mut self, version: &Version) -> Result<(), StepError> {
        let entry_point = self.component.entry_point(version);
        let step = match self.loader.resolve(version) {
            Ok(Some(step)) => step,
            Ok(None) => {
                return Err(StepError::MissingEntryPoint {
                    entry_point,
                    content_dir: self.content_dir.clone(),
                });
            }
            Err(err) => return Err(self.unexpected(format!("{err:#}"))),
        };

        debug!(entry_point = %entry_point, "invoking step");
        match invoke(step.as_ref()) {
            Ok(StepResult::Applied) => {}
            Ok(StepResult::Failed(diagnosis)) => return Err(StepError::StepFailed(diagnosis)),
            Err(reason) => return Err(self.unexpected(reason)),
        }

        self.persist(version)
    }

    /// Write `version` as the recorded version unless it already is.
    fn persist(&mut self, version: &Version) -> Result<(), StepError> {
        if self.state.recorded.as_ref() == Some(version) {
            debug!(version = %version, "recorded version already current, skipping write");
            return Ok(());
        }
        let key = self.component.version_key();
        self.store
            .set(&key, version.as_str())
            .map_err(|err| StepError::Persistence {
                key,
                version: version.to_string(),
                reason: format!("{err:#}"),
            })?;
        self.state.recorded = Some(version.clone());
        Ok(())
    }

    fn unexpected(&self, reason: String) -> StepError {
        StepError::Unexpected {
            reason,
            content_dir: self.content_dir.clone(),
        }
    }

    fn fail(&mut self, err: &StepError) {
        self.state.reporter.record_failure(err);
        self.state.reporter.fail();
        self.state.phase = RunPhase::Failed;
    }

    fn finish(self, path: Vec<Version>, start: Instant) -> RunSummary {
        let state = self.state;
        RunSummary {
            from: state.from,
            to: state.to,
            path,
            applied: state.applied,
            recorded: state.recorded,
            phase: state.phase,
            reporter: state.reporter,
            duration_ms: millis(start.elapsed()),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Call a step body, turning errors and panics into a failure reason.
fn invoke(step: &dyn MigrationStep) -> Result<StepResult, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| step.apply())) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!("step panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Diagnosis, Outcome};
    use crate::io::loader::StepRegistry;
    use crate::test_support::{MemoryStore, component, versions};
    use anyhow::anyhow;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn v(raw: &str) -> Version {
        Version::parse(raw).expect("version")
    }

    fn run(
        store: &MemoryStore,
        registry: &StepRegistry,
        discovered: &[&str],
        from: Option<&str>,
        to: &str,
    ) -> RunSummary {
        let component = component();
        let runner = MigrationRunner::new(
            &component,
            Path::new("/srv/content"),
            store,
            registry,
            from.map(v),
            v(to),
        );
        assert_eq!(runner.phase(), RunPhase::Idle);
        runner.run(&DiscoveredSteps::new(versions(discovered)))
    }

    #[test]
    fn applies_steps_in_order_and_records_each() {
        let store = MemoryStore::with_version("acme_version", "1.2.0");
        let mut registry = StepRegistry::new();
        registry.register_fn("1.3.0", || Ok(StepResult::Applied)).expect("register");
        registry.register_fn("1.4.0", || Ok(StepResult::Applied)).expect("register");

        let summary = run(&store, &registry, &["1.2.0", "1.4.0", "1.3.0"], Some("1.2.0"), "1.4.0");

        assert!(summary.succeeded());
        assert_eq!(summary.path, versions(&["1.3.0", "1.4.0"]));
        assert_eq!(store.writes(), vec!["1.3.0", "1.4.0"]);
        assert_eq!(store.current("acme_version"), Some("1.4.0".to_string()));
        assert_eq!(
            summary.reporter.success_narrative(),
            "Updates for version 1.3.0 applied.\nUpdates for version 1.4.0 applied.\nAll updates have been applied successfully."
        );
    }

    #[test]
    fn missing_entry_point_stops_before_any_write() {
        let store = MemoryStore::with_version("acme_version", "1.2.0");
        let mut registry = StepRegistry::new();
        registry.register_fn("1.4.0", || Ok(StepResult::Applied)).expect("register");

        let summary = run(&store, &registry, &["1.2.0", "1.3.0", "1.4.0"], Some("1.2.0"), "1.4.0");

        assert_eq!(summary.phase, RunPhase::Failed);
        assert_eq!(summary.path, versions(&["1.3.0", "1.4.0"]));
        assert!(store.writes().is_empty());
        assert_eq!(store.current("acme_version"), Some("1.2.0".to_string()));
        let failure = summary.reporter.failure().expect("failure narrative");
        assert_eq!(failure.title, "Acme - Error updating to version 1.4.0");
        assert!(failure.body().contains("acme_update_to_1_3_0"));
        assert!(failure.body().contains("/srv/content"));
    }

    #[test]
    fn first_failure_wins_and_later_steps_never_run() {
        let store = MemoryStore::default();
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();
        let mut registry = StepRegistry::new();
        registry.register_fn("1.0", || Ok(StepResult::Applied)).expect("register");
        registry
            .register_fn("1.1", || {
                Ok(StepResult::Failed(Diagnosis::new("acme_update_to_1_1").with_message("first")))
            })
            .expect("register");
        registry
            .register_fn("1.2", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(StepResult::Failed(Diagnosis::new("acme_update_to_1_2").with_message("second")))
            })
            .expect("register");

        let summary = run(&store, &registry, &["1.0", "1.1", "1.2"], None, "1.2");

        assert_eq!(summary.reporter.outcome(), Outcome::Failed);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
        assert_eq!(summary.applied, versions(&["1.0"]));
        assert_eq!(summary.recorded, Some(v("1.0")));
        assert_eq!(store.writes(), vec!["1.0"]);
        let failure = summary.reporter.failure().expect("failure");
        assert_eq!(failure.messages, vec!["first"]);
    }

    #[test]
    fn empty_path_syncs_target_version() {
        let store = MemoryStore::with_version("acme_version", "1.2.0");
        let summary = run(&store, &StepRegistry::new(), &[], Some("1.2.0"), "1.3.0");

        assert!(summary.succeeded());
        assert!(summary.path.is_empty());
        assert_eq!(store.writes(), vec!["1.3.0"]);
        assert_eq!(summary.reporter.success_narrative(), "");
    }

    #[test]
    fn no_sync_when_target_has_its_own_step() {
        let store = MemoryStore::default();
        let mut registry = StepRegistry::new();
        registry.register_fn("2.0", || Ok(StepResult::Applied)).expect("register");

        let summary = run(&store, &registry, &["2.0"], Some("1.0"), "2.0.0");

        assert!(summary.succeeded());
        assert_eq!(store.writes(), vec!["2.0"]);
    }

    #[test]
    fn equal_bounds_are_a_no_op_without_writes() {
        let store = MemoryStore::with_version("acme_version", "1.4.0");
        let registry = StepRegistry::new();

        for _ in 0..2 {
            let summary = run(&store, &registry, &["1.3.0", "1.4.0"], Some("1.4.0"), "1.4.0");
            assert!(summary.succeeded());
            assert!(summary.path.is_empty());
        }
        let summary = run(&store, &registry, &[], Some("1.4"), "1.4.0");
        assert!(summary.succeeded());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn persistence_failure_fails_the_step() {
        let store = MemoryStore::default();
        store.fail_writes_for("1.1");
        let mut registry = StepRegistry::new();
        registry.register_fn("1.0", || Ok(StepResult::Applied)).expect("register");
        registry.register_fn("1.1", || Ok(StepResult::Applied)).expect("register");
        registry.register_fn("1.2", || Ok(StepResult::Applied)).expect("register");

        let summary = run(&store, &registry, &["1.0", "1.1", "1.2"], Some("0.9"), "1.2");

        assert_eq!(summary.phase, RunPhase::Failed);
        assert_eq!(summary.applied, versions(&["1.0"]));
        assert_eq!(store.current("acme_version"), Some("1.0".to_string()));
        let body = summary.reporter.failure().expect("failure").body();
        assert!(body.contains("`acme_version` record to 1.1"));
    }

    #[test]
    fn failed_final_sync_fails_the_run() {
        let store = MemoryStore::default();
        store.fail_writes_for("3.0");
        let summary = run(&store, &StepRegistry::new(), &[], Some("2.0"), "3.0");

        assert_eq!(summary.phase, RunPhase::Failed);
        assert!(summary.reporter.failure().is_some());
    }

    #[test]
    fn step_errors_and_panics_are_unexpected_failures() {
        let store = MemoryStore::default();
        let mut registry = StepRegistry::new();
        registry
            .register_fn("1.0", || Err(anyhow!("database unreachable")))
            .expect("register");
        let summary = run(&store, &registry, &["1.0"], None, "1.0");
        let body = summary.reporter.failure().expect("failure").body();
        assert!(body.contains("An unexpected error has occurred"));
        assert!(body.contains("database unreachable"));

        let mut registry = StepRegistry::new();
        registry
            .register_fn("1.0", || panic!("step exploded"))
            .expect("register");
        let summary = run(&store, &registry, &["1.0"], None, "1.0");
        assert_eq!(summary.phase, RunPhase::Failed);
        let body = summary.reporter.failure().expect("failure").body();
        assert!(body.contains("step exploded"));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn duration_saturates_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
