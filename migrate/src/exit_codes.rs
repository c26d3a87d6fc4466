//! Stable exit codes for update-migrate CLI commands.

/// Command succeeded, or the component is already current.
pub const OK: i32 = 0;
/// Command failed due to invalid config, a held lock, or other errors.
pub const INVALID: i32 = 1;
/// `update-migrate run` stopped at a failing step.
pub const FAILED: i32 = 2;
/// `update-migrate status` found the component behind its target.
pub const BEHIND: i32 = 3;
