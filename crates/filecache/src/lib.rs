//! Worker-node localization cache for remote job artifacts.
//!
//! A distributed compute framework ships jobs whose tasks depend on
//! read-only artifacts (data files, zip/jar archives) stored in a remote
//! distributed filesystem. This crate materializes those artifacts on the
//! local disk of a worker node:
//! - each artifact is fetched at most once per identity and shared across
//!   tasks through reference counting;
//! - archives are expanded on localization;
//! - freshness is checked against the remote modification timestamp the job
//!   recorded at submission: remote drift is fatal to the job, while local
//!   staleness triggers a refresh;
//! - idle entries are swept once the base directory exceeds its configured
//!   byte budget;
//! - artifacts can be projected into a task's working directory as symlinks
//!   named by their URI fragments.
//!
//! # Overview
//!
//! Task setup acquires artifacts and task teardown releases them:
//!
//! ```ignore
//! let cache = CacheManager::new(dfs);
//! let local = cache.acquire(&uri, &conf, base_dir, None, /* archive */ false,
//!                           expected_stamp, work_dir)?;
//! // ... run the task against `local` ...
//! cache.release(&uri)?;
//! ```
//!
//! Cache metadata is in-memory only; after a restart, entry directories are
//! re-discovered by re-acquisition or removed by [`CacheManager::purge`].

mod cache;
pub mod conf;
mod dfs;
mod error;
mod extract;
mod registry;
mod symlink;
mod uri;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use cache::CacheManager;
pub use dfs::{DfsClient, FileStat};
pub use registry::CacheStatus;
pub use uri::{CacheUri, DFS_SCHEME};

// Re-export standalone operations
pub use extract::{unjar, unzip};
pub use symlink::project_all;
