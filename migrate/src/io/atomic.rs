//! Durable whole-file replacement (temp file + fsync + rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Replace `path` with `contents` so readers see either the old or the new file.
///
/// The temp file (`<path>.<tmp_extension>`) is synced before the rename.
pub fn write_atomic(path: &Path, tmp_extension: &str, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension(tmp_extension);
    let mut file = File::create(&tmp_path)
        .with_context(|| format!("create temp file {}", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("sync temp file {}", tmp_path.display()))?;
    drop(file);
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
