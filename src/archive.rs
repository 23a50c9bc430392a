use crate::error::MoveError;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the archive subdirectory processed reports are moved into.
pub const ARCHIVE_DIR_NAME: &str = "processed";

pub fn archive_dir_for(dir: &Path) -> PathBuf {
    dir.join(ARCHIVE_DIR_NAME)
}

/// Pick the destination for `file_name` inside `archive_dir`: the plain name
/// if free, otherwise `<stem>_<n><.ext>` with the lowest free `n >= 1`.
pub fn free_destination(archive_dir: &Path, file_name: &Path) -> Result<PathBuf, MoveError> {
    let plain = archive_dir.join(file_name);
    if !plain.exists() {
        return Ok(plain);
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    let ext = file_name.extension();

    let mut counter: u64 = 1;
    loop {
        let mut candidate = OsString::from(&stem);
        candidate.push(format!("_{counter}"));
        if let Some(ext) = ext {
            candidate.push(".");
            candidate.push(ext);
        }
        let destination = archive_dir.join(candidate);
        if !destination.exists() {
            return Ok(destination);
        }
        counter = counter
            .checked_add(1)
            .ok_or_else(|| MoveError::CollisionsExhausted {
                path: plain.clone(),
            })?;
    }
}

/// Move `path` into `archive_dir`, creating it if needed. Returns where the
/// file ended up.
pub fn move_to_archive(path: &Path, archive_dir: &Path) -> Result<PathBuf, MoveError> {
    fs::create_dir_all(archive_dir).map_err(|source| MoveError::CreateArchiveDir {
        dir: archive_dir.to_path_buf(),
        source,
    })?;

    let file_name = path.file_name().ok_or_else(|| MoveError::NoFileName {
        path: path.to_path_buf(),
    })?;
    let destination = free_destination(archive_dir, Path::new(file_name))?;

    if let Err(rename_err) = fs::rename(path, &destination) {
        // rename cannot cross filesystems; fall back to copy + remove
        if !path.exists() {
            return Err(MoveError::Rename {
                from: path.to_path_buf(),
                to: destination,
                source: rename_err,
            });
        }
        tracing::debug!(error = %rename_err, "rename failed, copying instead");
        copy_then_remove(path, &destination, |p| fs::remove_file(p))?;
    }

    tracing::info!(destination = %destination.display(), "Moved to archive");
    Ok(destination)
}

/// Copy `from` to `to`, then unlink `from`. If the unlink fails the copy is
/// removed again so the file exists in exactly one place.
fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove_source: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<(), MoveError> {
    let rename_err = |source| MoveError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    fs::copy(from, to).map_err(rename_err)?;
    if let Err(err) = remove_source(from) {
        if let Err(cleanup) = fs::remove_file(to) {
            tracing::warn!(path = %to.display(), error = %cleanup, "Could not remove partial archive copy");
        }
        return Err(rename_err(err));
    }
    Ok(())
}
