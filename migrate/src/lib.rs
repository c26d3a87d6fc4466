//! Version-gated, resumable migrations for a versioned component.
//!
//! A component records the version its persistent state was last migrated to.
//! When the deployed artifact declares a newer version, the steps between the
//! two run in ascending order, and the recorded version advances after each
//! one. The first failure stops the run and leaves the record at the last
//! applied step, so the next trigger resumes from there.
//!
//! - **[`core`]**: Pure logic (version ordering, path building, reporting).
//!   No I/O.
//! - **[`io`]**: Side-effecting operations (version store, step discovery and
//!   loading, process execution, notices, config).
//!
//! Orchestration modules ([`runner`], [`migrator`], [`registry`], [`plan`])
//! tie the two together for the library API and the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod migrator;
pub mod plan;
pub mod registry;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
