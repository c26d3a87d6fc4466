//! Deterministic, pure logic shared by the migration runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod path;
pub mod report;
pub mod types;
pub mod version;
