//! The localization cache manager.

use crate::conf;
use crate::dfs::{DfsClient, FileStat};
use crate::extract;
use crate::registry::{CacheStatus, EntryState, Registry};
use crate::symlink;
use crate::uri::{CacheUri, DFS_SCHEME};
use crate::{Error, Result};
use jobconf::JobConf;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Per-node localization cache for remote job artifacts.
///
/// One value per worker process, shared by reference across task-setup
/// threads. Each artifact is materialized at most once per identity and
/// shared through reference counting; idle entries are swept when the local
/// disk budget of the base directory is exceeded.
///
/// Work on distinct artifacts runs in parallel. Work on one artifact is
/// serialized by its entry lock, which also covers all disk I/O for that
/// artifact; the registry lock only ever guards map membership.
pub struct CacheManager {
    dfs: Arc<dyn DfsClient>,
    registry: Registry,
}

impl CacheManager {
    /// Creates a cache manager backed by the given remote filesystem.
    #[must_use]
    pub fn new(dfs: Arc<dyn DfsClient>) -> Self {
        Self {
            dfs,
            registry: Registry::default(),
        }
    }

    /// Canonical identity of `uri` within this node's cache: the artifact's
    /// host concatenated with its absolute path.
    ///
    /// URIs outside the `dfs` scheme contribute the default filesystem's
    /// host instead of their own. The fragment never contributes.
    pub fn cache_id(&self, uri: &CacheUri) -> Result<String> {
        let own_host = if uri.scheme() == Some(DFS_SCHEME) {
            uri.host()
        } else {
            None
        };
        let host = match own_host {
            Some(h) => h.to_string(),
            None => self.default_fs_host()?,
        };
        Ok(format!("{host}{}", uri.path()))
    }

    /// Materializes `uri` locally, reusing a previous localization when it is
    /// still fresh, and takes a reference on the entry.
    ///
    /// `expected_stamp` is the remote mtime the job recorded at submission;
    /// drift between it and the live remote file is fatal
    /// ([`Error::StaleArtifact`]). Drift between the remote file and a
    /// previously localized copy merely forces a refresh, which fails with
    /// [`Error::CacheInUse`] while other tasks still hold the entry.
    ///
    /// A pre-fetched `remote_stat` suppresses the freshness stat call.
    /// Archives (by `is_archive`) with a `.zip` or `.jar` name are expanded
    /// in place; for them the returned path is the entry directory, for
    /// plain files it is the copied file itself. When symlinking is enabled
    /// and `uri` carries a fragment, a symlink named after the fragment is
    /// created in `work_dir`.
    #[allow(clippy::too_many_arguments)]
    pub fn acquire(
        &self,
        uri: &CacheUri,
        conf: &JobConf,
        base_dir: &Path,
        remote_stat: Option<FileStat>,
        is_archive: bool,
        expected_stamp: i64,
        work_dir: &Path,
    ) -> Result<PathBuf> {
        let cid = self.cache_id(uri)?;
        let entry = self.registry.get_or_create(&cid, base_dir);

        let local_path = {
            let mut state = entry.state.lock();
            if !self.is_fresh(uri, &state, expected_stamp, remote_stat)? {
                if state.refcount >= 1 && state.materialized {
                    return Err(Error::cache_in_use(entry.local_load_path()));
                }
                self.materialize(uri, entry.local_load_path(), &mut state, is_archive)?;
            }
            let result = result_path(entry.local_load_path(), is_archive);
            if conf::symlinks_enabled(conf) {
                if let Some(fragment) = uri.fragment() {
                    symlink::link_if_absent(&result, &work_dir.join(fragment))?;
                }
            }
            state.refcount += 1;
            debug!(cache_id = %cid, refcount = state.refcount, "Acquired cache entry");
            result
        };

        // Piggy-backed sweep once the base directory outgrows its budget
        if disk_usage(base_dir) > conf::cache_size_limit(conf) {
            self.reclaim()?;
        }

        Ok(local_path)
    }

    /// Releases one acquisition of `uri`.
    ///
    /// Unknown ids are tolerated; the entry becomes eviction-eligible when
    /// its refcount reaches zero.
    pub fn release(&self, uri: &CacheUri) -> Result<()> {
        let cid = self.cache_id(uri)?;
        let Some(entry) = self.registry.get(&cid) else {
            return Ok(());
        };
        let mut state = entry.state.lock();
        if state.refcount == 0 {
            warn!(cache_id = %cid, "Released a cache entry that has no live acquirers");
        }
        state.refcount = state.refcount.saturating_sub(1);
        debug!(cache_id = %cid, refcount = state.refcount, "Released cache entry");
        Ok(())
    }

    /// Sweeps every idle entry: deletes its local tree and drops it from the
    /// registry.
    ///
    /// Opportunistic, not budget-meeting: entries still held stay untouched,
    /// so disk usage may remain above the configured budget afterwards.
    pub fn reclaim(&self) -> Result<()> {
        for (cid, entry) in self.registry.snapshot() {
            {
                let mut state = entry.state.lock();
                if state.refcount != 0 {
                    continue;
                }
                let path = entry.local_load_path();
                if path.exists() {
                    fs::remove_dir_all(path).map_err(|e| Error::io(e, path, "remove_dir_all"))?;
                }
                state.materialized = false;
                state.mtime = -1;
                debug!(cache_id = %cid, "Evicted idle cache entry");
            }
            // An acquire may have revived the entry since the delete; only
            // still-idle, unmaterialized entries leave the map. The snapshot
            // reference has to go first or it would pin the entry itself.
            drop(entry);
            self.registry.remove_if_idle(&cid);
        }
        Ok(())
    }

    /// Deletes every entry's local tree and clears the registry, regardless
    /// of refcounts.
    ///
    /// Intended for operator-driven reinitialization; in-flight tasks lose
    /// their caches. Delete failures are logged, not raised.
    pub fn purge(&self) {
        for (cid, entry) in self.registry.drain() {
            let path = entry.local_load_path();
            if let Err(e) = fs::remove_dir_all(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(cache_id = %cid, path = %path.display(), "Error cleaning up cache: {e}");
                }
            }
        }
    }

    /// Modification time of a remote artifact, as the remote filesystem
    /// reports it.
    pub fn remote_mtime(&self, uri: &CacheUri) -> Result<i64> {
        Ok(self.dfs.stat(uri)?.mtime)
    }

    /// The registry entry for `uri`, if it has ever been acquired.
    pub fn lookup(&self, uri: &CacheUri) -> Result<Option<Arc<CacheStatus>>> {
        Ok(self.registry.get(&self.cache_id(uri)?))
    }

    /// Number of entries currently registered.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.registry.len()
    }

    /// Freshness check under the entry lock: a materialized entry is
    /// reusable only when the remote stamp still matches both the job's
    /// recorded stamp and the locally recorded one.
    fn is_fresh(
        &self,
        uri: &CacheUri,
        state: &EntryState,
        expected_stamp: i64,
        remote_stat: Option<FileStat>,
    ) -> Result<bool> {
        if !state.materialized {
            return Ok(false);
        }
        let dfs_stamp = match remote_stat {
            Some(stat) => stat.mtime,
            None => self.dfs.stat(uri)?.mtime,
        };
        if dfs_stamp != expected_stamp {
            error!(
                uri = %uri,
                dfs_stamp,
                expected_stamp,
                "Remote file has changed since the job was submitted"
            );
            return Err(Error::stale_artifact(uri));
        }
        Ok(dfs_stamp == state.mtime)
    }

    /// Copies, expands, and chmods the artifact under the entry lock,
    /// replacing whatever the entry directory held before.
    fn materialize(
        &self,
        uri: &CacheUri,
        load_path: &Path,
        state: &mut EntryState,
        is_archive: bool,
    ) -> Result<()> {
        if load_path.exists() {
            fs::remove_dir_all(load_path)
                .map_err(|e| Error::io(e, load_path, "remove_dir_all"))?;
        }
        fs::create_dir_all(load_path).map_err(|e| Error::io(e, load_path, "create_dir_all"))?;

        let parchive = copied_file_path(load_path);
        self.dfs.copy_to_local(uri, &parchive)?;

        if is_archive {
            let name = parchive.to_string_lossy().to_lowercase();
            let dest = parchive.parent().unwrap_or(load_path).to_path_buf();
            if name.ends_with(".jar") {
                extract::unjar(&parchive, &dest)?;
            } else if name.ends_with(".zip") {
                extract::unzip(&parchive, &dest)?;
            }
            // Other extensions stay in place as plain copied files
        }

        add_execute_permission(&parchive);

        state.materialized = true;
        state.mtime = self.remote_mtime(uri)?;
        debug!(
            uri = %uri,
            path = %load_path.display(),
            mtime = state.mtime,
            "Localized artifact"
        );
        Ok(())
    }

    fn default_fs_host(&self) -> Result<String> {
        let name = self.dfs.name();
        let host = name.split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(Error::configuration(
                "neither the URI nor the default filesystem names a host",
            ));
        }
        Ok(host.to_string())
    }
}

/// Path the remote bytes are copied to: the entry directory's own basename,
/// inside it. For archives this is also the extraction source; extraction
/// targets its parent, the entry directory.
fn copied_file_path(load_path: &Path) -> PathBuf {
    match load_path.file_name() {
        Some(name) => load_path.join(name),
        None => load_path.to_path_buf(),
    }
}

fn result_path(load_path: &Path, is_archive: bool) -> PathBuf {
    if is_archive {
        load_path.to_path_buf()
    } else {
        copied_file_path(load_path)
    }
}

/// Recursively adds execute permission under `path`. Failures are logged and
/// swallowed; a task that cannot exec a cached artifact surfaces its own
/// error later.
fn add_execute_permission(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for entry in walkdir::WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            let res = fs::metadata(p).and_then(|meta| {
                let mut perms = meta.permissions();
                perms.set_mode(perms.mode() | 0o111);
                fs::set_permissions(p, perms)
            });
            if let Err(e) = res {
                warn!(path = %p.display(), "Failed to set execute permission: {e}");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Total bytes of all files under `base_dir`. Unreadable entries are
/// skipped; the sweep this feeds is best-effort anyway.
fn disk_usage(base_dir: &Path) -> u64 {
    walkdir::WalkDir::new(base_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
