//! Shared test fixtures: a directory-backed fake distributed filesystem.

use filecache::{CacheUri, DfsClient, Error, FileStat, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fake remote filesystem rooted in a local directory, with scripted
/// modification times and a counter of copy operations.
pub struct DirDfs {
    name: String,
    root: PathBuf,
    mtimes: Mutex<HashMap<String, i64>>,
    copies: AtomicUsize,
}

impl DirDfs {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            mtimes: Mutex::new(HashMap::new()),
            copies: AtomicUsize::new(0),
        }
    }

    fn local(&self, remote_path: &str) -> PathBuf {
        self.root.join(remote_path.trim_start_matches('/'))
    }

    /// Places a plain file at `remote_path` with the given scripted mtime.
    pub fn put_file(&self, remote_path: &str, bytes: &[u8], mtime: i64) {
        let local = self.local(remote_path);
        fs::create_dir_all(local.parent().unwrap()).unwrap();
        fs::write(&local, bytes).unwrap();
        self.set_mtime(remote_path, mtime);
    }

    /// Places a zip container at `remote_path` holding `entries`.
    pub fn put_zip(&self, remote_path: &str, entries: &[(&str, &[u8])], mtime: i64) {
        let local = self.local(remote_path);
        fs::create_dir_all(local.parent().unwrap()).unwrap();
        let file = fs::File::create(&local).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        self.set_mtime(remote_path, mtime);
    }

    /// Rewrites the scripted mtime of an existing remote file.
    pub fn set_mtime(&self, remote_path: &str, mtime: i64) {
        self.mtimes.lock().insert(remote_path.to_string(), mtime);
    }

    /// Number of copy-to-local operations performed so far.
    pub fn copy_count(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }
}

impl DfsClient for DirDfs {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn stat(&self, uri: &CacheUri) -> Result<FileStat> {
        let mtime = self
            .mtimes
            .lock()
            .get(uri.path())
            .copied()
            .ok_or_else(|| {
                Error::io(
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                    Path::new(uri.path()),
                    "stat",
                )
            })?;
        let len = fs::metadata(self.local(uri.path())).map(|m| m.len()).unwrap_or(0);
        Ok(FileStat { mtime, len })
    }

    fn copy_to_local(&self, uri: &CacheUri, dest: &Path) -> Result<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        let src = self.local(uri.path());
        fs::copy(&src, dest).map_err(|e| Error::io(e, &src, "copy"))?;
        Ok(())
    }
}
