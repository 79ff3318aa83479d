//! Registry of localized artifacts.
//!
//! The registry maps a cache id to its [`CacheStatus`]. Its lock guards only
//! map membership; all per-entry work happens under the entry's own lock, so
//! distinct artifacts localize in parallel while work on one artifact is
//! totally ordered.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Mutable per-entry state, guarded by the entry lock.
#[derive(Debug)]
pub(crate) struct EntryState {
    /// False until the first successful localization.
    pub materialized: bool,
    /// Live acquirers of this entry.
    pub refcount: u32,
    /// Remote modification time captured at last materialization; -1 if
    /// never materialized.
    pub mtime: i64,
}

/// A localized artifact: its directory on local disk plus refcount state.
///
/// The entry lock guards the mutable fields *and* the on-disk tree at
/// `local_load_path`; every disk operation for one artifact runs under it.
#[derive(Debug)]
pub struct CacheStatus {
    local_load_path: PathBuf,
    pub(crate) state: Mutex<EntryState>,
}

impl CacheStatus {
    fn new(local_load_path: PathBuf) -> Self {
        Self {
            local_load_path,
            state: Mutex::new(EntryState {
                materialized: false,
                refcount: 0,
                mtime: -1,
            }),
        }
    }

    /// Local directory allocated to this entry, fixed at creation.
    #[must_use]
    pub fn local_load_path(&self) -> &Path {
        &self.local_load_path
    }

    /// Current number of live acquirers.
    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.state.lock().refcount
    }

    /// Remote modification time recorded at last materialization, -1 if
    /// never materialized.
    #[must_use]
    pub fn mtime(&self) -> i64 {
        self.state.lock().mtime
    }

    /// Whether the artifact's bytes are on local disk.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.state.lock().materialized
    }
}

/// Map from cache id to entry, guarded by the registry lock.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<String, Arc<CacheStatus>>>,
}

impl Registry {
    /// Returns the entry for `cache_id`, inserting a fresh one rooted at
    /// `base_dir/cache_id` if absent.
    pub fn get_or_create(&self, cache_id: &str, base_dir: &Path) -> Arc<CacheStatus> {
        let mut entries = self.entries.lock();
        entries
            .entry(cache_id.to_string())
            .or_insert_with(|| Arc::new(CacheStatus::new(base_dir.join(cache_id))))
            .clone()
    }

    pub fn get(&self, cache_id: &str) -> Option<Arc<CacheStatus>> {
        self.entries.lock().get(cache_id).cloned()
    }

    /// Drops `cache_id` from the map if its entry is idle, holds no
    /// materialized bytes, and the map owns the only reference to it.
    ///
    /// The reference check is what makes removal sound: under the registry
    /// lock no new references can be handed out, so a sole-owner entry can
    /// never be revived by a racing acquire between the idle check and the
    /// removal.
    pub fn remove_if_idle(&self, cache_id: &str) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get(cache_id) else {
            return;
        };
        if Arc::strong_count(entry) > 1 {
            return;
        }
        let idle = entry
            .state
            .try_lock()
            .is_some_and(|state| state.refcount == 0 && !state.materialized);
        if idle {
            entries.remove(cache_id);
        }
    }

    /// All entries at a point in time, for lock-free iteration.
    pub fn snapshot(&self) -> Vec<(String, Arc<CacheStatus>)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Empties the map, returning everything that was in it.
    pub fn drain(&self) -> Vec<(String, Arc<CacheStatus>)> {
        self.entries.lock().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_state() {
        let registry = Registry::default();
        let entry = registry.get_or_create("h/a/b.dat", Path::new("/cache"));

        assert_eq!(entry.local_load_path(), Path::new("/cache/h/a/b.dat"));
        assert!(!entry.is_materialized());
        assert_eq!(entry.refcount(), 0);
        assert_eq!(entry.mtime(), -1);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = Registry::default();
        let a = registry.get_or_create("h/a/b.dat", Path::new("/cache"));
        // A different base dir does not reallocate the entry
        let b = registry.get_or_create("h/a/b.dat", Path::new("/elsewhere"));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_if_idle_spares_live_entries() {
        let registry = Registry::default();
        let entry = registry.get_or_create("h/a/b.dat", Path::new("/cache"));

        // An outside reference alone pins the entry
        registry.remove_if_idle("h/a/b.dat");
        assert_eq!(registry.len(), 1);

        entry.state.lock().refcount = 1;
        drop(entry);
        registry.remove_if_idle("h/a/b.dat");
        assert_eq!(registry.len(), 1);

        {
            let entry = registry.get("h/a/b.dat").unwrap();
            let mut state = entry.state.lock();
            state.refcount = 0;
            state.materialized = true;
        }
        registry.remove_if_idle("h/a/b.dat");
        assert_eq!(registry.len(), 1);

        registry.get("h/a/b.dat").unwrap().state.lock().materialized = false;
        registry.remove_if_idle("h/a/b.dat");
        assert_eq!(registry.len(), 0);

        // Removing an id that is gone is a no-op
        registry.remove_if_idle("h/a/b.dat");
    }
}
