//! Symlink projection into task working directories.

use crate::conf;
use crate::{Error, Result};
use jobconf::JobConf;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Creates `link` pointing at `target` unless something already exists at
/// `link`.
///
/// An existing path there counts as success; the projector never overwrites
/// anything in a task's working directory.
pub fn link_if_absent(target: &Path, link: &Path) -> Result<()> {
    if fs::symlink_metadata(link).is_ok() {
        return Ok(());
    }
    symlink(target, link).map_err(|e| Error::io(e, link, "symlink"))?;
    debug!(target = %target.display(), link = %link.display(), "Created symlink");
    Ok(())
}

/// Projects every direct child of `job_cache_dir` into `work_dir`.
///
/// No-op unless both paths are existing directories and symlinks are enabled
/// in `conf`.
pub fn project_all(conf: &JobConf, job_cache_dir: &Path, work_dir: &Path) -> Result<()> {
    if !job_cache_dir.is_dir() || !work_dir.is_dir() {
        return Ok(());
    }
    if !conf::symlinks_enabled(conf) {
        return Ok(());
    }
    let iter = fs::read_dir(job_cache_dir).map_err(|e| Error::io(e, job_cache_dir, "read_dir"))?;
    for entry in iter {
        let entry = entry.map_err(|e| Error::io(e, job_cache_dir, "read_dir_entry"))?;
        link_if_absent(&entry.path(), &work_dir.join(entry.file_name()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
