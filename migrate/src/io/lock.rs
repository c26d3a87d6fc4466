//! Exclusive run lock (`.migrate/run.lock`).
//!
//! Guards the read-compare-run-write cycle against a second process migrating
//! the same project. The lock is a file created with create-new semantics and
//! removed when the guard drops. A lock left behind by a process that no longer
//! exists is reclaimed where process liveness can be checked (`/proc`).

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock, failing if another live run holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut file = match create_lock_file(path)? {
            Some(file) => file,
            None => {
                let holder = fs::read_to_string(path).unwrap_or_default();
                let holder = holder.trim();
                if !holder_is_gone(holder) {
                    return Err(anyhow!(
                        "another migration run holds {} (pid {holder}); remove the file if that run is gone",
                        path.display()
                    ));
                }
                warn!(path = %path.display(), pid = holder, "reclaiming stale run lock");
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("remove stale lock {}", path.display()));
                    }
                }
                create_lock_file(path)?.ok_or_else(|| {
                    anyhow!(
                        "another migration run took {} while reclaiming a stale lock",
                        path.display()
                    )
                })?
            }
        };
        writeln!(file, "{}", std::process::id())
            .with_context(|| format!("write lock {}", path.display()))?;
        debug!(path = %path.display(), "run lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Best-effort release
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), err = %err, "failed to release run lock");
        }
    }
}

/// `Ok(None)` when the lock file already exists.
fn create_lock_file(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(err).with_context(|| format!("create lock {}", path.display())),
    }
}

/// True only when `holder` is a pid that provably no longer runs.
fn holder_is_gone(holder: &str) -> bool {
    let Ok(pid) = holder.parse::<u32>() else {
        return false;
    };
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        return false;
    }
    !proc_root.join(pid.to_string()).exists()
}
