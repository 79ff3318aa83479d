//! Typed accessors over the job configuration.
//!
//! The framework shuttles artifact lists, timestamps, localized paths, and
//! flags through the string-keyed job configuration. Every encoding and
//! decoding for those keys lives in this module; the rest of the crate and
//! the framework's submission side both go through it.

use crate::dfs::DfsClient;
use crate::uri::CacheUri;
use crate::{Error, Result};
use jobconf::JobConf;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Comma-separated URIs of archive artifacts to localize.
pub const CACHE_ARCHIVES: &str = "mapred.cache.archives";
/// Comma-separated URIs of file artifacts to localize.
pub const CACHE_FILES: &str = "mapred.cache.files";
/// Comma-separated mtimes, positional with [`CACHE_ARCHIVES`].
pub const CACHE_ARCHIVES_TIMESTAMPS: &str = "mapred.cache.archives.timestamps";
/// Comma-separated mtimes, positional with [`CACHE_FILES`].
pub const CACHE_FILES_TIMESTAMPS: &str = "mapred.cache.files.timestamps";
/// Comma-separated local paths of materialized archives.
pub const CACHE_LOCAL_ARCHIVES: &str = "mapred.cache.localArchives";
/// Comma-separated local paths of materialized files.
pub const CACHE_LOCAL_FILES: &str = "mapred.cache.localFiles";
/// Classpath entries contributed by cached files.
pub const CLASSPATH_FILES: &str = "mapred.job.classpath.files";
/// Classpath entries contributed by cached archives.
pub const CLASSPATH_ARCHIVES: &str = "mapred.job.classpath.archives";
/// `"yes"` enables symlinking into task working directories.
pub const CREATE_SYMLINK: &str = "mapred.create.symlink";
/// Byte budget for the cache base directory.
pub const LOCAL_CACHE_SIZE: &str = "local.cache.size";

/// Default byte budget for the cache base directory (1 MiB).
pub const DEFAULT_CACHE_SIZE: u64 = 1_048_576;

/// Separator for the classpath keys: the host OS path-list separator.
const PATH_LIST_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Replaces the list of archive artifacts to localize.
pub fn set_cache_archives(conf: &mut JobConf, archives: &[CacheUri]) {
    conf.set(CACHE_ARCHIVES, join_uris(archives));
}

/// Archive artifacts to localize.
pub fn cache_archives(conf: &JobConf) -> Result<Vec<CacheUri>> {
    parse_uris(&conf.get_strings(CACHE_ARCHIVES))
}

/// Replaces the list of file artifacts to localize.
pub fn set_cache_files(conf: &mut JobConf, files: &[CacheUri]) {
    conf.set(CACHE_FILES, join_uris(files));
}

/// File artifacts to localize.
pub fn cache_files(conf: &JobConf) -> Result<Vec<CacheUri>> {
    parse_uris(&conf.get_strings(CACHE_FILES))
}

/// Appends one archive artifact to the list.
pub fn add_cache_archive(conf: &mut JobConf, uri: &CacheUri) {
    conf.append(CACHE_ARCHIVES, &uri.to_string(), ",");
}

/// Appends one file artifact to the list.
pub fn add_cache_file(conf: &mut JobConf, uri: &CacheUri) {
    conf.append(CACHE_FILES, &uri.to_string(), ",");
}

/// Records the remote mtimes of the archive artifacts, positional with the
/// archive list.
pub fn set_archive_timestamps(conf: &mut JobConf, stamps: &[i64]) {
    conf.set(CACHE_ARCHIVES_TIMESTAMPS, join_stamps(stamps));
}

/// Remote mtimes of the archive artifacts.
pub fn archive_timestamps(conf: &JobConf) -> Result<Vec<i64>> {
    parse_stamps(CACHE_ARCHIVES_TIMESTAMPS, &conf.get_strings(CACHE_ARCHIVES_TIMESTAMPS))
}

/// Records the remote mtimes of the file artifacts, positional with the file
/// list.
pub fn set_file_timestamps(conf: &mut JobConf, stamps: &[i64]) {
    conf.set(CACHE_FILES_TIMESTAMPS, join_stamps(stamps));
}

/// Remote mtimes of the file artifacts.
pub fn file_timestamps(conf: &JobConf) -> Result<Vec<i64>> {
    parse_stamps(CACHE_FILES_TIMESTAMPS, &conf.get_strings(CACHE_FILES_TIMESTAMPS))
}

/// The file artifacts paired with their recorded timestamps, in list order.
///
/// Fails when a listed URI has no timestamp recorded for it (or vice versa).
pub fn file_artifacts(conf: &JobConf) -> Result<Vec<(CacheUri, i64)>> {
    pair_artifacts(cache_files(conf)?, file_timestamps(conf)?, CACHE_FILES)
}

/// The archive artifacts paired with their recorded timestamps, in list
/// order.
///
/// Fails when a listed URI has no timestamp recorded for it (or vice versa).
pub fn archive_artifacts(conf: &JobConf) -> Result<Vec<(CacheUri, i64)>> {
    pair_artifacts(
        cache_archives(conf)?,
        archive_timestamps(conf)?,
        CACHE_ARCHIVES,
    )
}

/// Records where the archive artifacts were materialized on this node.
pub fn set_local_archives(conf: &mut JobConf, paths: &[PathBuf]) {
    conf.set(CACHE_LOCAL_ARCHIVES, join_paths(paths, ","));
}

/// Local paths of the materialized archives.
pub fn local_archives(conf: &JobConf) -> Vec<PathBuf> {
    conf.get_strings(CACHE_LOCAL_ARCHIVES)
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

/// Records where the file artifacts were materialized on this node.
pub fn set_local_files(conf: &mut JobConf, paths: &[PathBuf]) {
    conf.set(CACHE_LOCAL_FILES, join_paths(paths, ","));
}

/// Local paths of the materialized files.
pub fn local_files(conf: &JobConf) -> Vec<PathBuf> {
    conf.get_strings(CACHE_LOCAL_FILES)
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

/// Adds `path` to the file classpath and registers it, qualified against the
/// default filesystem, as a cache file.
pub fn add_file_to_classpath(conf: &mut JobConf, path: &Path, dfs: &dyn DfsClient) -> Result<()> {
    conf.append(CLASSPATH_FILES, &path.display().to_string(), PATH_LIST_SEPARATOR);
    let uri = CacheUri::qualified(&dfs.name(), path.display().to_string())?;
    add_cache_file(conf, &uri);
    Ok(())
}

/// Classpath entries contributed by cached files.
pub fn file_classpath(conf: &JobConf) -> Vec<PathBuf> {
    split_path_list(conf.get(CLASSPATH_FILES))
}

/// Adds `path` to the archive classpath and registers it, qualified against
/// the default filesystem, as a cache archive.
pub fn add_archive_to_classpath(
    conf: &mut JobConf,
    path: &Path,
    dfs: &dyn DfsClient,
) -> Result<()> {
    conf.append(CLASSPATH_ARCHIVES, &path.display().to_string(), PATH_LIST_SEPARATOR);
    let uri = CacheUri::qualified(&dfs.name(), path.display().to_string())?;
    add_cache_archive(conf, &uri);
    Ok(())
}

/// Classpath entries contributed by cached archives.
pub fn archive_classpath(conf: &JobConf) -> Vec<PathBuf> {
    split_path_list(conf.get(CLASSPATH_ARCHIVES))
}

/// Turns on symlinking of localized artifacts into task working directories.
pub fn enable_symlinks(conf: &mut JobConf) {
    conf.set(CREATE_SYMLINK, "yes");
}

/// Whether symlinks into task working directories are enabled.
#[must_use]
pub fn symlinks_enabled(conf: &JobConf) -> bool {
    conf.get(CREATE_SYMLINK) == Some("yes")
}

/// Byte budget for the cache base directory.
#[must_use]
pub fn cache_size_limit(conf: &JobConf) -> u64 {
    conf.get_i64(LOCAL_CACHE_SIZE, DEFAULT_CACHE_SIZE as i64).max(0) as u64
}

/// Validates the URIs of a symlinking job before submission: every URI must
/// carry a fragment, and fragments must be pairwise distinct
/// (case-insensitively) across files and archives together.
///
/// Empty inputs are trivially valid.
#[must_use]
pub fn check_uris(files: &[CacheUri], archives: &[CacheUri]) -> bool {
    let mut seen = HashSet::new();
    for uri in files.iter().chain(archives) {
        let Some(fragment) = uri.fragment() else {
            return false;
        };
        if !seen.insert(fragment.to_lowercase()) {
            return false;
        }
    }
    true
}

fn join_uris(uris: &[CacheUri]) -> String {
    uris.iter()
        .map(CacheUri::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_uris(raw: &[String]) -> Result<Vec<CacheUri>> {
    raw.iter().map(|s| CacheUri::parse(s)).collect()
}

fn join_stamps(stamps: &[i64]) -> String {
    stamps
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_stamps(key: &str, raw: &[String]) -> Result<Vec<i64>> {
    raw.iter()
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::configuration(format!("malformed timestamp {s} under {key}")))
        })
        .collect()
}

fn pair_artifacts(
    uris: Vec<CacheUri>,
    stamps: Vec<i64>,
    key: &str,
) -> Result<Vec<(CacheUri, i64)>> {
    if uris.len() != stamps.len() {
        return Err(Error::configuration(format!(
            "{} timestamps recorded for {} artifacts under {key}",
            stamps.len(),
            uris.len()
        )));
    }
    Ok(uris.into_iter().zip(stamps).collect())
}

fn join_paths(paths: &[PathBuf], separator: &str) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

fn split_path_list(raw: Option<&str>) -> Vec<PathBuf> {
    raw.map(|value| {
        value
            .split(PATH_LIST_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    })
    .unwrap_or_default()
}
