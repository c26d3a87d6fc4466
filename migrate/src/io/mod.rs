//! I/O adapters for migration runs.

pub mod atomic;
pub mod config;
pub mod discovery;
pub mod init;
pub mod loader;
pub mod lock;
pub mod manifest;
pub mod notice;
pub mod process;
pub mod run_log;
pub mod store;
