//! Expansion of archive containers on localization.

use crate::{Error, Result};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Expands a zip container into `dest`.
pub fn unzip(archive: &Path, dest: &Path) -> Result<()> {
    extract_zip(archive, dest)
}

/// Expands a jar container into `dest`.
///
/// Jars are zip containers; the separate entry point exists because callers
/// dispatch on the artifact extension.
pub fn unjar(archive: &Path, dest: &Path) -> Result<()> {
    extract_zip(archive, dest)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path).map_err(|e| Error::io(e, archive_path, "open"))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::io(std::io::Error::other(e), archive_path, "read archive"))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::io(std::io::Error::other(e), archive_path, "read archive entry"))?;

        // Entries whose name would escape the destination are skipped
        let Some(rel) = entry.enclosed_name() else {
            continue;
        };
        let outpath = dest.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| Error::io(e, &outpath, "create_dir_all"))?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
            }
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| Error::io(e, archive_path, "read archive entry"))?;
            fs::write(&outpath, &content).map_err(|e| Error::io(e, &outpath, "write"))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(&outpath, fs::Permissions::from_mode(mode));
            }
        }
    }

    debug!(
        archive = %archive_path.display(),
        dest = %dest.display(),
        "Expanded archive"
    );
    Ok(())
}
